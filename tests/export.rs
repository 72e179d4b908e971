#![allow(dead_code)]

mod common;

use std::path::PathBuf;

use common::{
    allclose,
    host_add,
};
use futures_lite::io::Cursor;
use pgl::{
    export::{
        export,
        test_exported_model,
    },
    graph::{
        capture,
        file::FileError,
        AddModule,
        CaptureMode,
        Graph,
    },
};

const ATOL: f32 = 1e-6;

/// Scratch path under the system temp directory, removed on drop.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "pgl-test-{}-{}.pgf",
            std::process::id(),
            tag
        ));
        Self { path }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn serialize(graph: &Graph) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    futures_lite::future::block_on(graph.write_to(&mut buffer)).unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn it_round_trips_through_the_binary_format() {
    let module = AddModule;
    let graph = capture(&module, CaptureMode::Script).unwrap();

    let bytes = serialize(&graph);
    let reloaded = Graph::read_from(Cursor::new(bytes)).await.unwrap();

    assert_eq!(reloaded, graph);

    let x = vec![1.0_f32, -2.0, 0.25, 100.0];
    let y = vec![0.5_f32, 2.0, -0.25, -100.0];
    let expected = module.forward(&x, &y).unwrap();
    let result = reloaded.run(&[&x, &y]).unwrap();
    assert!(allclose(&result, &expected, ATOL));
}

#[tokio::test]
async fn it_rejects_a_bad_magic() {
    let graph = capture(&AddModule, CaptureMode::Script).unwrap();
    let mut bytes = serialize(&graph);
    bytes[0] = b'X';

    assert!(matches!(
        Graph::read_from(Cursor::new(bytes)).await,
        Err(FileError::InvalidMagic { .. })
    ));
}

#[tokio::test]
async fn it_rejects_an_unknown_version() {
    let graph = capture(&AddModule, CaptureMode::Script).unwrap();
    let mut bytes = serialize(&graph);
    // version field sits right after the 4-byte magic
    bytes[4] = 0xff;

    assert!(matches!(
        Graph::read_from(Cursor::new(bytes)).await,
        Err(FileError::IncompatibleVersion { .. })
    ));
}

#[tokio::test]
async fn it_rejects_a_truncated_artifact() {
    let graph = capture(&AddModule, CaptureMode::Script).unwrap();
    let mut bytes = serialize(&graph);
    bytes.truncate(bytes.len() - 2);

    assert!(matches!(
        Graph::read_from(Cursor::new(bytes)).await,
        Err(FileError::Io(_))
    ));
}

#[tokio::test]
async fn it_exports_and_reloads_a_traced_graph() {
    let scratch = ScratchFile::new("trace");

    let exported = export(&scratch.path, CaptureMode::Trace).await.unwrap();
    let reloaded = Graph::open(&scratch.path).await.unwrap();
    assert_eq!(reloaded, exported);

    let x: Vec<f32> = (0..100).map(|i| i as f32 * 0.125).collect();
    let y: Vec<f32> = (0..100).map(|i| 10.0 - i as f32).collect();
    let result = reloaded.run(&[&x, &y]).unwrap();
    assert!(allclose(&result, &host_add(&x, &y), ATOL));
}

#[tokio::test]
async fn it_exports_and_reloads_a_scripted_graph() {
    let scratch = ScratchFile::new("script");

    let exported = export(&scratch.path, CaptureMode::Script).await.unwrap();
    let reloaded = Graph::open(&scratch.path).await.unwrap();
    assert_eq!(reloaded, exported);
}

#[tokio::test]
async fn it_captures_the_same_graph_either_way() {
    let traced = capture(&AddModule, CaptureMode::Trace).unwrap();
    let scripted = capture(&AddModule, CaptureMode::Script).unwrap();
    assert_eq!(traced, scripted);
}

#[tokio::test]
async fn it_passes_the_exported_model_check() {
    let scratch = ScratchFile::new("check");

    export(&scratch.path, CaptureMode::Script).await.unwrap();
    assert!(test_exported_model(&scratch.path).await);
}

#[tokio::test]
async fn it_fails_the_check_for_a_missing_artifact() {
    let scratch = ScratchFile::new("missing");
    assert!(!test_exported_model(&scratch.path).await);
}
