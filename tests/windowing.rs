use libriphone::phoneme::features::concat_frames;
use libriphone::phoneme::ErrorKind;
use ndarray::{concatenate, s, Array2, Axis};

fn ramp(frames: usize, dim: usize) -> Array2<f32> {
    Array2::from_shape_fn((frames, dim), |(t, d)| (t * 100 + d) as f32)
}

#[test]
fn every_odd_window_keeps_frame_count_and_scales_width() {
    for frames in [1, 2, 5, 17] {
        for n in [1, 3, 5, 11, 21] {
            let input = ramp(frames, 39);
            let windowed = concat_frames(input.view(), n).unwrap();
            assert_eq!(windowed.dim(), (frames, 39 * n), "frames={frames} n={n}");
        }
    }
}

#[test]
fn three_frame_window_replicates_boundaries() {
    let input = ramp(3, 2);
    let (a, b, c) = (input.row(0), input.row(1), input.row(2));
    let windowed = concat_frames(input.view(), 3).unwrap();

    let first = concatenate(Axis(0), &[a, a, b]).unwrap();
    let last = concatenate(Axis(0), &[b, c, c]).unwrap();
    assert_eq!(windowed.row(0), first);
    assert_eq!(windowed.row(2), last);
}

#[test]
fn center_slot_reproduces_the_original_frame() {
    let input = ramp(9, 4);
    let windowed = concat_frames(input.view(), 7).unwrap();
    let center = windowed.slice(s![.., 3 * 4..4 * 4]);
    assert_eq!(center, input);
}

#[test]
fn interior_slots_follow_temporal_offsets() {
    let input = ramp(9, 2);
    let windowed = concat_frames(input.view(), 5).unwrap();
    for offset in 0..5 {
        let slot = windowed.slice(s![4, offset * 2..(offset + 1) * 2]);
        assert_eq!(slot, input.row(4 + offset - 2));
    }
}

#[test]
fn even_window_is_invalid_argument() {
    let err = concat_frames(ramp(3, 2).view(), 4).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
