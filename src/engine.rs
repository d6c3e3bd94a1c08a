use crate::demo::DemoState;

pub fn update(state: &mut DemoState, ui: &imgui::Ui) -> anyhow::Result<()> {
    state.update();

    ui.window("Camera")
        .position([10.0, 190.0], imgui::Condition::FirstUseEver)
        .size([280.0, 70.0], imgui::Condition::FirstUseEver)
        .build(|| {
            ui.slider("Orbit speed", -2.0, 2.0, &mut state.orbit_speed);
        });

    Ok(())
}
