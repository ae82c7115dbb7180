//! Stock routines for autonomous and operator use.
//!
//! | Name | Behaviour |
//! |---|---|
//! | `ShootNote` | shooter 5800 RPM (0.3 differential); feeder 2000 RPM after 1 s; ends when both beam-breaks are clear |
//! | `ShootNoteTimed` | 2 s: shooter 5000 RPM, feeder 3000 RPM after 1 s; then 1 s with both at 0 RPM |
//! | `IntakeNote` | intake down and collecting, feeder 5000 RPM; ends when the feeder beam-break sees a note |
//! | `ShootSubwoofer` | pivot to 56°, shooter 5800 RPM; once both are there, feeder 2000 RPM; ends when both beam-breaks are clear |
//!
//! The beam-break gated routines end on their first tick when no note is
//! loaded.  Every routine here leaves the rollers and flywheels it drove
//! stopped when it ends.

use std::time::Duration;

use crate::action::{Action, CompositionError};
use crate::named::ActionRegistry;
use crate::subsystems::{Intake, Mechanisms, feeder, intake, pivot, shooter};

pub const SHOOT_RPM: f64 = 5800.0;
pub const SHOOT_DIFFERENTIAL: f64 = 0.3;
pub const SUBWOOFER_PIVOT_DEGREES: f64 = 56.0;
/// How close the pivot must be before feeding at the subwoofer.
pub const PIVOT_TOLERANCE_RADIANS: f64 = 0.03;

/// Neither beam-break sees a note.
pub fn note_clear(m: &Mechanisms) -> bool {
    !m.feeder.feeder_beambreak_obstructed() && !m.feeder.shooter_beambreak_obstructed()
}

fn stop_shooter_and_feeder(m: &mut Mechanisms, _interrupted: bool) {
    m.shooter.request_stop();
    m.feeder.request_stop();
}

/// Spin up, feed after one second, and stop once the note is gone.
pub fn shoot_note(period: Duration) -> Result<Action, CompositionError> {
    Ok(Action::join(vec![
        shooter::set_rpm(SHOOT_RPM, SHOOT_DIFFERENTIAL),
        Action::wait(Duration::from_secs(1), period).then(feeder::set_rpm(2000.0)),
    ])?
    .until(note_clear)
    .finally_do(stop_shooter_and_feeder)
    .named("ShootNote"))
}

/// Shoot on a fixed schedule, for when the beam-breaks cannot be trusted.
pub fn shoot_note_timed(period: Duration) -> Result<Action, CompositionError> {
    let spin_up = Action::deadline(
        Action::wait(Duration::from_secs(2), period),
        vec![
            shooter::set_rpm(5000.0, SHOOT_DIFFERENTIAL),
            Action::wait(Duration::from_secs(1), period).then(feeder::set_rpm(3000.0)),
        ],
    )?;
    let spin_down = Action::deadline(
        Action::wait(Duration::from_secs(1), period),
        vec![shooter::set_rpm(0.0, SHOOT_DIFFERENTIAL), feeder::set_rpm(0.0)],
    )?;
    Ok(Action::sequence(vec![spin_up, spin_down])?
        .finally_do(stop_shooter_and_feeder)
        .named("ShootNoteTimed"))
}

/// Collect a note into the feeder.
pub fn intake_note() -> Result<Action, CompositionError> {
    Ok(
        Action::join(vec![intake::set_intake_down(false), feeder::set_rpm(5000.0)])?
            .until(|m| m.feeder.feeder_beambreak_obstructed())
            .finally_do(|m, _| {
                m.intake.controller_mut().stop(Intake::ROLLER);
                m.feeder.request_stop();
            })
            .named("IntakeNote"),
    )
}

/// Shoot from against the subwoofer.  The pivot holds its angle afterwards.
pub fn shoot_subwoofer() -> Result<Action, CompositionError> {
    let angle = SUBWOOFER_PIVOT_DEGREES.to_radians();
    let feed = Action::wait_until(move |m| {
        m.pivot.at_target(PIVOT_TOLERANCE_RADIANS) && m.shooter.at_setpoint()
    })
    .then(feeder::set_rpm(2000.0));
    Ok(Action::join(vec![
        pivot::set_pivot_target(angle),
        shooter::set_rpm(SHOOT_RPM, SHOOT_DIFFERENTIAL),
        feed,
    ])?
    .until(note_clear)
    .finally_do(stop_shooter_and_feeder)
    .named("ShootSubwoofer"))
}

/// Register every stock routine under its table name.
///
/// # Errors
///
/// Propagates a [`CompositionError`] from any routine.
pub fn register_stock(registry: &mut ActionRegistry, period: Duration) -> Result<(), CompositionError> {
    registry.register("ShootNote", move || shoot_note(period))?;
    registry.register("ShootNoteTimed", move || shoot_note_timed(period))?;
    registry.register("IntakeNote", intake_note)?;
    registry.register("ShootSubwoofer", shoot_subwoofer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_types::{ChannelRequest, MechanismId};

    use crate::action::ActionState;
    use crate::subsystems::{Feeder, Shooter};
    use crate::testing::sim_mechanisms;

    const PERIOD: Duration = Duration::from_millis(20);

    fn tick(m: &mut Mechanisms, action: &mut Action) -> ActionState {
        m.refresh_all();
        let state = action.step(m);
        m.apply_all();
        state
    }

    #[test]
    fn stock_routines_register() {
        let mut registry = ActionRegistry::new();
        register_stock(&mut registry, PERIOD).expect("stock");
        assert_eq!(
            registry.names(),
            ["IntakeNote", "ShootNote", "ShootNoteTimed", "ShootSubwoofer"]
        );
        let subwoofer = registry.get("ShootSubwoofer").expect("registered");
        let required: Vec<MechanismId> = subwoofer.requirements().iter().copied().collect();
        assert_eq!(
            required,
            [MechanismId::Feeder, MechanismId::Shooter, MechanismId::Pivot]
        );
    }

    #[test]
    fn shoot_note_feeds_after_one_second_and_ends_when_clear() {
        let mut m = sim_mechanisms();
        let sensors = m.sim_sensors().cloned().expect("sim");
        sensors.feeder.set_obstructed(true);
        sensors.shooter.set_obstructed(true);

        let mut action = shoot_note(PERIOD).expect("routine");
        m.refresh_all();
        action.start(&mut m);
        for _ in 0..50 {
            assert_eq!(tick(&mut m, &mut action), ActionState::Running);
        }
        assert_eq!(m.feeder.controller().request(Feeder::ROLLER), None);
        tick(&mut m, &mut action);
        assert_eq!(
            m.feeder.controller().request(Feeder::ROLLER),
            Some(ChannelRequest::Velocity(2000.0))
        );
        assert_eq!(
            m.shooter.controller().request(Shooter::RIGHT),
            Some(ChannelRequest::Velocity(SHOOT_RPM * SHOOT_DIFFERENTIAL))
        );

        // One beam-break clearing is not enough.
        sensors.feeder.set_obstructed(false);
        assert_eq!(tick(&mut m, &mut action), ActionState::Running);
        sensors.shooter.set_obstructed(false);
        assert_eq!(tick(&mut m, &mut action), ActionState::Finished);
        assert_eq!(
            m.shooter.controller().request(Shooter::LEFT),
            Some(ChannelRequest::Voltage(0.0))
        );
    }

    #[test]
    fn shoot_note_timed_runs_three_seconds() {
        let mut m = sim_mechanisms();
        let mut action = shoot_note_timed(PERIOD).expect("routine");
        m.refresh_all();
        action.start(&mut m);
        let mut ticks = 0;
        while tick(&mut m, &mut action) == ActionState::Running {
            ticks += 1;
            if ticks == 75 {
                assert_eq!(
                    m.feeder.controller().request(Feeder::ROLLER),
                    Some(ChannelRequest::Velocity(3000.0))
                );
            }
            if ticks == 125 {
                assert_eq!(
                    m.shooter.controller().request(Shooter::LEFT),
                    Some(ChannelRequest::Velocity(0.0))
                );
            }
            assert!(ticks < 1000);
        }
        // 100 ticks of spin-up and 50 of spin-down; the last one finishes.
        assert_eq!(ticks + 1, 150);
    }

    #[test]
    fn intake_note_stops_at_feeder_beambreak() {
        let mut m = sim_mechanisms();
        let sensors = m.sim_sensors().cloned().expect("sim");
        let mut action = intake_note().expect("routine");
        m.refresh_all();
        action.start(&mut m);
        for _ in 0..10 {
            assert_eq!(tick(&mut m, &mut action), ActionState::Running);
        }
        assert_eq!(
            m.feeder.controller().request(Feeder::ROLLER),
            Some(ChannelRequest::Velocity(5000.0))
        );
        sensors.feeder.set_obstructed(true);
        assert_eq!(tick(&mut m, &mut action), ActionState::Finished);
        assert_eq!(
            m.feeder.controller().request(Feeder::ROLLER),
            Some(ChannelRequest::Voltage(0.0))
        );
        assert_eq!(m.intake.target_radians(), Some(intake::DOWN_RADIANS));
    }

    #[test]
    fn shoot_subwoofer_waits_for_pivot_and_flywheels() {
        let mut m = sim_mechanisms();
        let sensors = m.sim_sensors().cloned().expect("sim");
        sensors.shooter.set_obstructed(true);
        let mut action = shoot_subwoofer().expect("routine");
        m.refresh_all();
        action.start(&mut m);

        assert_eq!(tick(&mut m, &mut action), ActionState::Running);
        assert_eq!(m.feeder.controller().request(Feeder::ROLLER), None);
        assert_eq!(
            m.pivot.target_radians(),
            Some(SUBWOOFER_PIVOT_DEGREES.to_radians())
        );

        let mut fed_after = None;
        for n in 0..500 {
            tick(&mut m, &mut action);
            if m.feeder.controller().request(Feeder::ROLLER).is_some() {
                fed_after = Some(n);
                break;
            }
        }
        assert!(fed_after.is_some(), "feeder never started");
        assert!(m.pivot.at_target(PIVOT_TOLERANCE_RADIANS));

        sensors.shooter.set_obstructed(false);
        assert_eq!(tick(&mut m, &mut action), ActionState::Finished);
        // Pivot holds; shooter and feeder stop.
        assert!(m.pivot.target_radians().is_some());
        assert_eq!(
            m.feeder.controller().request(Feeder::ROLLER),
            Some(ChannelRequest::Voltage(0.0))
        );
    }

    #[test]
    fn gated_routine_with_no_note_ends_immediately() {
        let mut m = sim_mechanisms();
        let mut action = shoot_note(PERIOD).expect("routine");
        m.refresh_all();
        action.start(&mut m);
        assert_eq!(tick(&mut m, &mut action), ActionState::Finished);
    }
}
