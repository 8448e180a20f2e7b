use std::fs;
use std::path::Path;

pub const FEATURE_DIM: usize = 3;
pub const CLASS_COUNT: usize = 3;
pub const TRAIN_UTTERANCES: usize = 10;
pub const TEST_FRAME_COUNTS: [usize; 3] = [4, 7, 5];

/// Writes a tiny LibriPhone-style corpus whose class is readable from the frame itself.
pub fn write_corpus(root: &Path) {
    let train_dir = root.join("feat").join("train");
    let test_dir = root.join("feat").join("test");
    fs::create_dir_all(&train_dir).unwrap();
    fs::create_dir_all(&test_dir).unwrap();

    let mut manifest = String::new();
    let mut labels = String::new();
    for utt in 0..TRAIN_UTTERANCES {
        let id = format!("train-{utt:02}");
        let frame_count = 6 + utt % 5;
        let classes: Vec<usize> = (0..frame_count).map(|t| (t + utt) % CLASS_COUNT).collect();
        write_frames(&train_dir.join(format!("{id}.json")), &classes);

        manifest.push_str(&format!("{id}\n"));
        let joined: Vec<String> = classes.iter().map(usize::to_string).collect();
        labels.push_str(&format!("{id} {}\n", joined.join(" ")));
    }
    fs::write(root.join("train_split.txt"), manifest).unwrap();
    fs::write(root.join("train_labels.txt"), labels).unwrap();

    let mut test_manifest = String::new();
    for (utt, frame_count) in TEST_FRAME_COUNTS.iter().enumerate() {
        let id = format!("test-{utt:02}");
        let classes: Vec<usize> = (0..*frame_count).map(|t| t % CLASS_COUNT).collect();
        write_frames(&test_dir.join(format!("{id}.json")), &classes);
        test_manifest.push_str(&format!("{id}\n"));
    }
    fs::write(root.join("test_split.txt"), test_manifest).unwrap();
}

fn write_frames(path: &Path, classes: &[usize]) {
    let frames: Vec<Vec<f32>> = classes
        .iter()
        .map(|&class| {
            (0..FEATURE_DIM)
                .map(|dim| if dim == class { 1.0 } else { 0.0 })
                .collect()
        })
        .collect();
    fs::write(path, serde_json::to_string(&frames).unwrap()).unwrap();
}

pub fn test_frame_total() -> usize {
    TEST_FRAME_COUNTS.iter().sum()
}
