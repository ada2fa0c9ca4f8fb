use anyhow::{Context, Result};
use hdf5::{File, Group};
use log::debug;
use merger_common::{InputConfig, MovieConfig, ParticleSet, ParticlesConfig, Vec3};
use std::path::Path;

/// Reads the selected particle types of a snapshot file into a [`ParticleSet`].
///
/// Each call opens the file, reads it and closes it again; nothing is cached.
pub struct SnapshotReader {
    input: InputConfig,
    particles: ParticlesConfig,
}

impl SnapshotReader {
    pub fn new(config: &MovieConfig) -> Self {
        Self {
            input: config.input.clone(),
            particles: config.particles.clone(),
        }
    }

    /// Reads positions and masses (in Msun) of one snapshot.
    ///
    /// Fixed-mass types get the configured particle mass. The star-forming type is read
    /// with its own masses for every snapshot after index 0.
    pub fn read(&self, snapshot_index: u32) -> Result<ParticleSet> {
        let path = self.input.snapshot_path(snapshot_index);
        let file = File::open(&path)
            .with_context(|| format!("Failed to open snapshot file: {}", path.display()))?;

        let mut set = ParticleSet::new(snapshot_index);
        let unit = self.particles.mass_unit_msun;
        let fixed_mass = self.particles.particle_mass * unit;

        for name in &self.particles.fixed_mass_types {
            let group = open_group(&file, name, &path)?;
            let positions = read_coordinates(&group, &self.particles.coordinates_dataset)
                .with_context(|| format!("Failed to read {} coordinates from {}", name, path.display()))?;
            set.push_uniform_group(name, positions, fixed_mass);
        }

        // New stars only exist once the simulation has run
        if let Some(name) = self.particles.star_forming_type.as_deref().filter(|_| snapshot_index > 0) {
            let group = open_group(&file, name, &path)?;
            let positions = read_coordinates(&group, &self.particles.coordinates_dataset)
                .with_context(|| format!("Failed to read {} coordinates from {}", name, path.display()))?;
            let masses: Vec<f64> = read_masses(&group, &self.particles.mass_dataset)
                .with_context(|| format!("Failed to read {} masses from {}", name, path.display()))?
                .into_iter()
                .map(|m| m * unit)
                .collect();
            set.push_group(name, positions, masses)
                .with_context(|| format!("Inconsistent particle data in {}", path.display()))?;
        }

        debug!(
            "Read {} particles from {} ({:?})",
            set.len(),
            path.display(),
            set.groups
        );
        Ok(set)
    }

    /// Lists the groups at the root of a snapshot file and the members of each.
    pub fn describe(&self, snapshot_index: u32) -> Result<Vec<(String, Vec<String>)>> {
        let path = self.input.snapshot_path(snapshot_index);
        let file = File::open(&path)
            .with_context(|| format!("Failed to open snapshot file: {}", path.display()))?;

        let mut groups = Vec::new();
        for name in file.member_names()? {
            // Root-level datasets have no members to list
            let members = match file.group(&name) {
                Ok(group) => group.member_names()?,
                Err(_) => Vec::new(),
            };
            groups.push((name, members));
        }
        Ok(groups)
    }
}

fn open_group(file: &File, name: &str, path: &Path) -> Result<Group> {
    file.group(name)
        .with_context(|| format!("Snapshot {} has no particle group '{}'", path.display(), name))
}

fn read_coordinates(group: &Group, name: &str) -> Result<Vec<Vec3>> {
    let dataset = group
        .dataset(name)
        .with_context(|| format!("Missing dataset '{}'", name))?;
    let shape = dataset.shape();
    if shape.len() != 2 || shape[1] != 3 {
        anyhow::bail!("Dataset '{}' has shape {:?}, expected N x 3.", name, shape);
    }
    let raw: Vec<f64> = dataset.read_raw()?;
    Ok(raw.chunks_exact(3).map(|c| Vec3::new(c[0], c[1], c[2])).collect())
}

fn read_masses(group: &Group, name: &str) -> Result<Vec<f64>> {
    let dataset = group
        .dataset(name)
        .with_context(|| format!("Missing dataset '{}'", name))?;
    let shape = dataset.shape();
    if shape.len() != 1 {
        anyhow::bail!("Dataset '{}' has shape {:?}, expected one value per particle.", name, shape);
    }
    Ok(dataset.read_raw()?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// One particle group to write into a test snapshot.
    pub struct GroupSpec {
        pub name: &'static str,
        pub positions: Vec<[f32; 3]>,
        pub masses: Option<Vec<f32>>,
    }

    pub fn config_in(dir: &Path) -> MovieConfig {
        let mut config = MovieConfig::default();
        config.input.data_dir = dir.join("data");
        config.render.output_dir = dir.join("images");
        config.video.output = dir.join("stars.mp4");
        config
    }

    /// Writes a snapshot file the way the simulation lays them out.
    pub fn write_snapshot(config: &MovieConfig, snapshot_index: u32, groups: &[GroupSpec]) {
        std::fs::create_dir_all(&config.input.data_dir).unwrap();
        let file = File::create(config.input.snapshot_path(snapshot_index)).unwrap();
        for spec in groups {
            let group = file.create_group(spec.name).unwrap();
            let flat: Vec<f32> = spec.positions.iter().flatten().copied().collect();
            group
                .new_dataset::<f32>()
                .shape((spec.positions.len(), 3))
                .create("Coordinates")
                .unwrap()
                .write_raw(flat.as_slice())
                .unwrap();
            if let Some(masses) = &spec.masses {
                group
                    .new_dataset::<f32>()
                    .shape(masses.len())
                    .create("Mass")
                    .unwrap()
                    .write_raw(masses.as_slice())
                    .unwrap();
            }
        }
    }

    pub fn disk_and_bulge() -> Vec<GroupSpec> {
        vec![
            GroupSpec {
                name: "PartType2",
                positions: vec![[1.0, 2.0, 3.0], [-4.5, 0.5, 0.0], [10.0, -10.0, 1.0]],
                masses: None,
            },
            GroupSpec {
                name: "PartType3",
                positions: vec![[0.25, 0.25, 0.0], [-1.0, -1.0, -1.0]],
                masses: None,
            },
        ]
    }

    pub fn new_stars(count: usize) -> GroupSpec {
        GroupSpec {
            name: "PartType4",
            positions: (0..count).map(|i| [i as f32 * 0.5, -(i as f32), 0.0]).collect(),
            masses: Some(vec![1.0e-8; count]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn initial_snapshot_uses_fixed_masses_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut groups = disk_and_bulge();
        // Present but ignored at index 0
        groups.push(new_stars(4));
        write_snapshot(&config, 0, &groups);

        let set = SnapshotReader::new(&config).read(0).unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.positions.len(), set.masses.len());
        assert_eq!(set.positions[0], Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(set.positions[4], Vec3::new(-1.0, -1.0, -1.0));

        let fixed = config.particles.particle_mass * config.particles.mass_unit_msun;
        assert!(set.masses.iter().all(|&m| m == fixed));
        assert_eq!(
            set.groups,
            vec![("PartType2".to_string(), 3), ("PartType3".to_string(), 2)]
        );
    }

    #[test]
    fn later_snapshots_add_new_stars_with_their_masses() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut groups = disk_and_bulge();
        groups.push(new_stars(4));
        write_snapshot(&config, 2, &groups);

        let set = SnapshotReader::new(&config).read(2).unwrap();
        assert_eq!(set.len(), 9);
        assert_eq!(set.masses.len(), 9);
        assert_eq!(set.groups.last(), Some(&("PartType4".to_string(), 4)));
        assert_eq!(set.positions[8], Vec3::new(1.5, -3.0, 0.0));

        let star_mass = 1.0e-8f32 as f64 * config.particles.mass_unit_msun;
        assert!(set.masses[5..].iter().all(|&m| (m - star_mass).abs() < 1e-9 * star_mass));
    }

    #[test]
    fn missing_group_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_snapshot(&config, 4, &disk_and_bulge());

        let err = SnapshotReader::new(&config).read(4).unwrap_err();
        assert!(format!("{:#}", err).contains("PartType4"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = SnapshotReader::new(&config).read(6).unwrap_err();
        assert!(err.to_string().contains("stars_snapshot_006.hdf5"));
    }

    #[test]
    fn mass_count_must_match_positions() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut groups = disk_and_bulge();
        let mut stars = new_stars(3);
        stars.masses = Some(vec![1.0e-8; 2]);
        groups.push(stars);
        write_snapshot(&config, 8, &groups);

        assert!(SnapshotReader::new(&config).read(8).is_err());
    }

    #[test]
    fn describe_lists_groups_and_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let mut groups = disk_and_bulge();
        groups.push(new_stars(1));
        write_snapshot(&config, 0, &groups);

        let listing = SnapshotReader::new(&config).describe(0).unwrap();
        let names: Vec<&str> = listing.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(names, vec!["PartType2", "PartType3", "PartType4"]);
        assert_eq!(listing[2].1, vec!["Coordinates".to_string(), "Mass".to_string()]);
        assert_eq!(listing[0].1, vec!["Coordinates".to_string()]);
    }
}
