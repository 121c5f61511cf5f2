//! Saves a top-down software render of the current scene as a PNG.

use std::fs;
use std::path::{Path, PathBuf};

use bevy::input::Input;
use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, Task};
use chrono::{Local, NaiveDateTime};
use diorama_engine::preview::{render_preview, PreviewSettings};
use futures_lite::future;
use image::RgbaImage;
use thiserror::Error;

use crate::config::SceneSettings;
use crate::frame::{FrameDriver, FrameSet};
use crate::world::SceneSources;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("could not create {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not encode png: {0}")]
    Encode(#[from] image::ImageError),
}

/// Set by the UI button; P does the same.
#[derive(Resource, Default)]
pub struct SnapshotRequest(pub bool);

#[derive(Component)]
pub struct SnapshotTask(Task<Result<PathBuf, SnapshotError>>);

pub struct SnapshotPlugin;

impl Plugin for SnapshotPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SnapshotRequest>().add_systems(
            Update,
            (start_snapshot, finish_snapshot)
                .after(FrameSet::Drive)
                .run_if(resource_exists::<SceneSources>()),
        );
    }
}

pub fn snapshot_file_name(at: NaiveDateTime) -> String {
    format!("diorama_{}.png", at.format("%Y%m%d_%H%M%S"))
}

pub fn save_snapshot(image: &RgbaImage, path: &Path) -> Result<(), SnapshotError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    image.save(path)?;
    Ok(())
}

fn start_snapshot(
    mut commands: Commands,
    keys: Res<Input<KeyCode>>,
    mut request: ResMut<SnapshotRequest>,
    driver: Res<FrameDriver>,
    sources: Res<SceneSources>,
    settings: Res<SceneSettings>,
    pending: Query<(), With<SnapshotTask>>,
) {
    let requested = keys.just_pressed(KeyCode::P) || request.0;
    request.0 = false;
    if !requested {
        return;
    }
    if !pending.is_empty() {
        warn!("Snapshot already in progress");
        return;
    }
    let Some(frame) = driver.last else {
        return;
    };

    let field = sources.field.clone();
    let volume = sources.volume.clone();
    let instances = sources.instances.clone();
    let uniforms = frame.uniforms;
    let clouds = frame.clouds.params;
    let preview = PreviewSettings {
        width: settings.preview_size,
        height: settings.preview_size,
        frame: frame.clouds.frame,
        ..default()
    };
    let path = settings
        .preview_dir
        .join(snapshot_file_name(Local::now().naive_local()));

    info!("Rendering snapshot to {path:?}");
    let task = AsyncComputeTaskPool::get().spawn(async move {
        let image = render_preview(&field, &uniforms, &*volume, &instances, &clouds, &preview);
        save_snapshot(&image, &path).map(|_| path)
    });
    commands.spawn(SnapshotTask(task));
}

fn finish_snapshot(mut commands: Commands, mut tasks: Query<(Entity, &mut SnapshotTask)>) {
    for (entity, mut task) in tasks.iter_mut() {
        let Some(result) = future::block_on(future::poll_once(&mut task.0)) else {
            continue;
        };
        match result {
            Ok(path) => info!("Snapshot saved to {path:?}"),
            Err(e) => error!("Snapshot failed: {e}"),
        }
        commands.entity(entity).despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn file_name_is_timestamped() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        assert_eq!(snapshot_file_name(at), "diorama_20240102_030405.png");
    }

    #[test]
    fn save_creates_missing_directory() {
        let dir = std::env::temp_dir().join(format!("diorama_snapshot_{}", std::process::id()));
        let path = dir.join("nested").join("shot.png");
        save_snapshot(&RgbaImage::new(2, 2), &path).unwrap();
        assert!(path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
