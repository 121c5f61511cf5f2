use std::ops::RangeInclusive;

use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin};
use diorama_engine::params::{
    Biome, ParameterUpdate, CLOUD_STEPS_RANGE, CLOUD_UNIT_RANGE, POSITION_FREQUENCY_RANGE,
    STRENGTH_RANGE, WARP_FREQUENCY_RANGE, WARP_STRENGTH_RANGE,
};
use diorama_engine::schedule::ParameterSender;

use crate::frame::{FrameDriver, FrameSet};
use crate::snapshot::SnapshotRequest;
use crate::world::terrain::TerrainState;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin).add_systems(
            Update,
            parameter_panel
                .before(FrameSet::Drive)
                .run_if(resource_exists::<FrameDriver>()),
        );
    }
}

fn slider(
    ui: &mut egui::Ui,
    label: &str,
    value: f32,
    range: RangeInclusive<f32>,
    sender: &ParameterSender,
    update: fn(f32) -> ParameterUpdate,
) {
    let mut v = value;
    if ui.add(egui::Slider::new(&mut v, range).text(label)).changed() {
        sender.send(update(v));
    }
}

fn color_row(
    ui: &mut egui::Ui,
    label: &str,
    color: Vec3,
    sender: &ParameterSender,
    update: impl FnOnce(Vec3) -> ParameterUpdate,
) {
    ui.horizontal(|ui| {
        let mut rgb = color.to_array();
        if egui::color_picker::color_edit_button_rgb(ui, &mut rgb).changed() {
            sender.send(update(Vec3::from_array(rgb)));
        }
        ui.label(label);
    });
}

/// Every edit becomes a [`ParameterUpdate`]; the scheduler applies it at the
/// start of the next tick.
fn parameter_panel(
    mut contexts: EguiContexts,
    driver: Res<FrameDriver>,
    diagnostics: Res<DiagnosticsStore>,
    terrain: Option<Res<TerrainState>>,
    mut snapshot: ResMut<SnapshotRequest>,
) {
    let uniforms = *driver.scheduler.uniforms();
    let cloud = driver.scheduler.cloud_uniforms().params;
    let sender = &driver.sender;

    egui::Window::new("Diorama").show(contexts.ctx_mut(), |ui| {
        if let Some(fps) = diagnostics
            .get(FrameTimeDiagnosticsPlugin::FPS)
            .and_then(|d| d.smoothed())
        {
            ui.label(format!("FPS: {fps:.1}"));
        }
        if terrain.as_ref().is_some_and(|t| t.building) {
            ui.label("Rebuilding terrain...");
        }

        ui.collapsing("Terrain", |ui| {
            let shape = uniforms.shape;
            let rows: [(&str, f32, RangeInclusive<f32>, fn(f32) -> ParameterUpdate); 4] = [
                (
                    "Position frequency",
                    shape.position_frequency,
                    POSITION_FREQUENCY_RANGE,
                    ParameterUpdate::PositionFrequency,
                ),
                ("Strength", shape.strength, STRENGTH_RANGE, ParameterUpdate::Strength),
                (
                    "Warp frequency",
                    shape.warp_frequency,
                    WARP_FREQUENCY_RANGE,
                    ParameterUpdate::WarpFrequency,
                ),
                (
                    "Warp strength",
                    shape.warp_strength,
                    WARP_STRENGTH_RANGE,
                    ParameterUpdate::WarpStrength,
                ),
            ];
            for (label, value, range, update) in rows {
                slider(ui, label, value, range, sender, update);
            }
        });

        ui.collapsing("Biome colours", |ui| {
            for biome in Biome::ALL {
                color_row(ui, biome.label(), uniforms.palette.get(biome), sender, |c| {
                    ParameterUpdate::BiomeColor(biome, c)
                });
            }
        });

        ui.collapsing("Clouds", |ui| {
            color_row(ui, "Base", cloud.base, sender, ParameterUpdate::CloudBase);
            let rows: [(&str, f32, fn(f32) -> ParameterUpdate); 3] = [
                ("Threshold", cloud.threshold, ParameterUpdate::CloudThreshold),
                ("Opacity", cloud.opacity, ParameterUpdate::CloudOpacity),
                ("Range", cloud.range, ParameterUpdate::CloudRange),
            ];
            for (label, value, update) in rows {
                slider(ui, label, value, CLOUD_UNIT_RANGE, sender, update);
            }
            let mut steps = cloud.steps;
            if ui.add(egui::Slider::new(&mut steps, CLOUD_STEPS_RANGE).text("Steps")).changed() {
                sender.send(ParameterUpdate::CloudSteps(steps));
            }
        });

        ui.separator();
        if ui.button("Save snapshot (P)").clicked() {
            snapshot.0 = true;
        }
        ui.label("Drag to orbit, scroll to zoom, Esc to quit");
    });
}
