//! End-to-end builds from a `.tri` mesh to octree files

use std::path::{Path, PathBuf};
use svo::glam::Vec3;
use svo::octree::NOCHILD;
use svo::{
    build_svo, build_svo_with_progress, AaBox, BuildConfig, ColorMode, OctreeReader, SvoError,
    TriFormat, TriWriter, Triangle, VoxelData, VoxelizeMethod,
};

fn unit_box() -> AaBox<Vec3> {
    AaBox::new(Vec3::ZERO, Vec3::ONE)
}

/// Write `triangles` as `<dir>/<name>.tri` and return the header path
fn write_mesh(dir: &Path, name: &str, format: TriFormat, triangles: &[Triangle]) -> PathBuf {
    let mut writer = TriWriter::create(dir.join(name), format).unwrap();
    for t in triangles {
        writer.write(t).unwrap();
    }
    writer.finish(unit_box()).unwrap().header_path()
}

fn corner_triangle() -> Triangle {
    Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y).with_color(Vec3::new(0.2, 0.6, 0.9))
}

fn scattered_mesh() -> Vec<Triangle> {
    vec![
        Triangle::new(
            Vec3::new(0.1, 0.1, 0.1),
            Vec3::new(0.3, 0.1, 0.1),
            Vec3::new(0.1, 0.3, 0.2),
        )
        .with_color(Vec3::X),
        // crosses the center, so every partition boundary
        Triangle::new(
            Vec3::new(0.4, 0.45, 0.5),
            Vec3::new(0.6, 0.5, 0.45),
            Vec3::new(0.5, 0.6, 0.55),
        )
        .with_color(Vec3::Y),
        Triangle::new(
            Vec3::new(0.7, 0.8, 0.6),
            Vec3::new(0.9, 0.7, 0.8),
            Vec3::new(0.8, 0.9, 0.9),
        )
        .with_color(Vec3::Z),
    ]
}

fn root_octants(header: &Path) -> Vec<usize> {
    let root = OctreeReader::open(header).unwrap().read_root().unwrap();
    (0..8).filter(|&i| root.children_offset[i] != NOCHILD).collect()
}

#[test]
fn test_single_triangle_tight() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "corner", TriFormat::Full, &[corner_triangle()]);
    let config = BuildConfig::new(&input).with_gridsize(2);

    let report = build_svo(&config).unwrap();
    assert_eq!(report.n_partitions, 1);
    assert_eq!(report.voxels_filled, 4);
    assert_eq!(report.n_nodes, 5);
    assert_eq!(report.n_data, 5);
    assert_eq!(report.output, dir.path().join("corner_2.octree"));

    // the three crossed cells plus the one the hypotenuse touches at a corner
    assert_eq!(root_octants(&report.output), vec![0, 1, 2, 3]);

    let data = OctreeReader::open(&report.output).unwrap().read_data().unwrap();
    assert!(data[1..].iter().all(|v| v.color == Vec3::new(0.2, 0.6, 0.9)));
    assert!(data[1..].iter().all(|v| v.normal == Vec3::Z));
}

#[test]
fn test_single_triangle_thick() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "corner", TriFormat::Full, &[corner_triangle()]);
    let config = BuildConfig::new(&input)
        .with_gridsize(2)
        .with_method(VoxelizeMethod::Huang);

    let report = build_svo(&config).unwrap();
    assert_eq!(report.voxels_filled, 3);
    assert_eq!(root_octants(&report.output), vec![0, 1, 2]);
}

#[test]
fn test_partition_count_does_not_change_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "scatter", TriFormat::Full, &scattered_mesh());

    let in_core = build_svo(&BuildConfig::new(&input).with_gridsize(256)).unwrap();
    assert_eq!(in_core.n_partitions, 1);
    let reader = OctreeReader::open(&in_core.output).unwrap();
    let (nodes, data) = (reader.read_nodes().unwrap(), reader.read_data().unwrap());

    // 256^3 bytes is 16 MB; a 2 MB budget forces one partition per octant
    let split = build_svo(
        &BuildConfig::new(&input)
            .with_gridsize(256)
            .with_memory_limit(2),
    )
    .unwrap();
    assert_eq!(split.n_partitions, 8);
    // the center triangle lands in all 8 partitions
    assert_eq!(split.triangles_processed, 10);
    assert_eq!(split.voxels_filled, in_core.voxels_filled);

    let reader = OctreeReader::open(&split.output).unwrap();
    assert_eq!(reader.read_nodes().unwrap(), nodes);
    assert_eq!(reader.read_data().unwrap(), data);
}

#[test]
fn test_empty_partitions_between_filled_ones() {
    let dir = tempfile::tempdir().unwrap();
    // only the first and last octants hold geometry
    let mesh = scattered_mesh();
    let input = write_mesh(dir.path(), "corners", TriFormat::Full, &[mesh[0], mesh[2]]);

    let in_core = build_svo(&BuildConfig::new(&input).with_gridsize(256)).unwrap();
    let reader = OctreeReader::open(&in_core.output).unwrap();
    let (nodes, data) = (reader.read_nodes().unwrap(), reader.read_data().unwrap());

    let mut seen = Vec::new();
    let split = build_svo_with_progress(
        &BuildConfig::new(&input)
            .with_gridsize(256)
            .with_memory_limit(2),
        |p| seen.push((p.triangles, p.voxels)),
    )
    .unwrap();
    assert_eq!(split.n_partitions, 8);
    assert_eq!(split.empty_partitions, 6);
    assert_eq!(split.triangles_processed, 2);
    assert!(seen[1..7].iter().all(|&s| s == (0, 0)));
    assert!(seen[0].1 > 0 && seen[7].1 > 0);
    assert_eq!(split.voxels_filled, in_core.voxels_filled);

    let reader = OctreeReader::open(&split.output).unwrap();
    assert_eq!(reader.read_nodes().unwrap(), nodes);
    assert_eq!(reader.read_data().unwrap(), data);
    assert_eq!(root_octants(&split.output), vec![0, 7]);
}

#[test]
fn test_progress_reports_every_partition() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "scatter", TriFormat::Full, &scattered_mesh());
    let config = BuildConfig::new(&input)
        .with_gridsize(256)
        .with_memory_limit(2);

    let mut seen = Vec::new();
    let report = build_svo_with_progress(&config, |p| seen.push((p.index, p.total, p.voxels))).unwrap();
    assert_eq!(seen.len(), 8);
    assert!(seen.iter().enumerate().all(|(i, &(index, total, _))| index == i && total == 8));
    assert_eq!(seen.iter().map(|s| s.2).sum::<u64>(), report.voxels_filled);
}

#[test]
fn test_partition_files_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "scatter", TriFormat::Full, &scattered_mesh());
    let config = BuildConfig::new(&input)
        .with_gridsize(256)
        .with_memory_limit(2);

    build_svo(&config).unwrap();
    assert!(!dir.path().join("scatter_256_8.trip").exists());
    assert!(!dir.path().join("scatter_256_8_0.tripdata").exists());

    build_svo(&config.with_keep_partitions(true)).unwrap();
    assert!(dir.path().join("scatter_256_8.trip").exists());
    assert!(dir.path().join("scatter_256_8_0.tripdata").exists());
}

#[test]
fn test_geometry_only_builds_binary_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "geo", TriFormat::GeometryOnly, &scattered_mesh());
    let config = BuildConfig::new(&input)
        .with_gridsize(64)
        .with_levels(true)
        .with_sparseness(0.0);

    let report = build_svo(&config).unwrap();
    assert!(report.binary);
    assert!(!report.generate_levels);
    assert_eq!(report.dense_partitions, 1);
    assert_eq!(report.n_data, 2);

    let reader = OctreeReader::open(&report.output).unwrap();
    let leaves: Vec<_> = reader
        .read_nodes()
        .unwrap()
        .into_iter()
        .filter(|n| n.is_leaf())
        .collect();
    assert_eq!(leaves.len() as u64, report.voxels_filled);
    assert!(leaves.iter().all(|n| n.data == 1));
}

#[test]
fn test_levels_and_color_modes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "scatter", TriFormat::Full, &scattered_mesh());
    let config = BuildConfig::new(&input)
        .with_gridsize(16)
        .with_levels(true)
        .with_color(ColorMode::Normal);

    let report = build_svo(&config).unwrap();
    // every written node carries data: null record + one per node
    assert_eq!(report.n_data, report.n_nodes + 1);

    let reader = OctreeReader::open(&report.output).unwrap();
    let data: Vec<VoxelData> = reader.read_data().unwrap();
    for node in reader.read_nodes().unwrap().iter().filter(|n| n.is_leaf()) {
        let v = data[node.data as usize];
        assert!((v.color - (v.normal + Vec3::ONE) * 0.5).length() < 1e-6);
    }
}

#[test]
fn test_missing_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let absent = BuildConfig::new(dir.path().join("nothing.tri")).with_gridsize(8);
    assert!(matches!(build_svo(&absent), Err(SvoError::MissingFile(_))));

    let input = write_mesh(dir.path(), "corner", TriFormat::Full, &[corner_triangle()]);
    std::fs::remove_file(dir.path().join("corner.tridata")).unwrap();
    let config = BuildConfig::new(&input).with_gridsize(8);
    match build_svo(&config) {
        Err(SvoError::MissingFile(path)) => assert_eq!(path, dir.path().join("corner.tridata")),
        other => panic!("expected missing sidecar, got {other:?}"),
    }
}

#[test]
fn test_bad_config_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "corner", TriFormat::Full, &[corner_triangle()]);
    let config = BuildConfig::new(&input).with_gridsize(100);
    assert!(matches!(build_svo(&config), Err(SvoError::Config(_))));
    assert!(!dir.path().join("corner_100.octreenodes").exists());
}

#[test]
fn test_empty_mesh_gives_single_root() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_mesh(dir.path(), "empty", TriFormat::Full, &[]);
    let report = build_svo(&BuildConfig::new(&input).with_gridsize(32)).unwrap();
    assert_eq!(report.voxels_filled, 0);
    assert_eq!(report.empty_partitions, 1);
    assert_eq!(report.n_nodes, 1);
    assert!(root_octants(&report.output).is_empty());
}
