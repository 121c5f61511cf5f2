use std::path::Path;

use bevy::diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin};
use bevy::prelude::*;

mod config;
mod controller;
mod frame;
mod rendering;
mod snapshot;
mod ui;
mod world;

use crate::config::{report_settings_source, SceneSettings, SETTINGS_FILE};

fn main() {
    let (settings, source) = SceneSettings::load_or_default(Path::new(SETTINGS_FILE));

    App::new()
        .insert_resource(ClearColor(Color::rgb(0.53, 0.81, 0.92)))
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: settings.window.title.clone(),
                resolution: (settings.window.width, settings.window.height).into(),
                resizable: true,
                ..default()
            }),
            ..default()
        }))
        .insert_resource(settings)
        .insert_resource(source)
        .add_systems(Startup, report_settings_source)
        .add_plugins(LogDiagnosticsPlugin::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(rendering::RenderingPlugin)
        .add_plugins(world::WorldPlugin)
        .add_plugins(controller::ControllerPlugin)
        .add_plugins(frame::FramePlugin)
        .add_plugins(ui::UiPlugin)
        .add_plugins(snapshot::SnapshotPlugin)
        .run();
}
