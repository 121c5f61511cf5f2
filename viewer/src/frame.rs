//! Binds the engine's frame scheduler to Bevy's update loop. Bevy owns
//! presentation and vsync; each `Update` is one scheduler tick.

use bevy::app::AppExit;
use bevy::input::Input;
use bevy::prelude::*;
use diorama_engine::schedule::{FrameScheduler, FrameSnapshot, ParameterSender, StopHandle};

use crate::controller::{OrbitController, OrbitRig};
use crate::rendering::cloud_material::{write_cloud_uniforms, CloudAssets, CloudMaterial};

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameSet {
    Drive,
}

#[derive(Resource)]
pub struct FrameDriver {
    pub scheduler: FrameScheduler,
    pub sender: ParameterSender,
    pub stop: StopHandle,
    /// Snapshot of the most recent tick.
    pub last: Option<FrameSnapshot>,
}

impl FrameDriver {
    pub fn new(scheduler: FrameScheduler) -> Self {
        Self {
            sender: scheduler.parameter_sender(),
            stop: scheduler.stop_handle(),
            scheduler,
            last: None,
        }
    }
}

pub struct FramePlugin;

impl Plugin for FramePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                drive_frame.in_set(FrameSet::Drive),
                (request_stop_on_escape, exit_on_stop).chain().after(FrameSet::Drive),
            )
                .run_if(resource_exists::<FrameDriver>()),
        );
    }
}

fn drive_frame(
    time: Res<Time>,
    mut driver: ResMut<FrameDriver>,
    mut cameras: Query<(&mut OrbitController, &mut Transform)>,
    clouds: Option<Res<CloudAssets>>,
    mut cloud_materials: ResMut<Assets<CloudMaterial>>,
) {
    let Ok((mut controller, mut transform)) = cameras.get_single_mut() else {
        return;
    };
    let mut rig = OrbitRig {
        controller: &mut *controller,
        transform: &mut *transform,
    };
    let snapshot = driver.scheduler.tick(time.delta(), &mut rig);

    if let Some(clouds) = clouds {
        write_cloud_uniforms(&snapshot.clouds, &clouds, &mut cloud_materials);
    }
    driver.last = Some(snapshot);
}

fn request_stop_on_escape(keys: Res<Input<KeyCode>>, driver: Res<FrameDriver>) {
    if keys.just_pressed(KeyCode::Escape) {
        info!("Escape pressed, stopping");
        driver.stop.stop();
    }
}

fn exit_on_stop(driver: Res<FrameDriver>, mut exit: EventWriter<AppExit>) {
    if driver.stop.is_stopped() {
        exit.send(AppExit);
    }
}
