use strider_core::TelemetrySource;
use strider_kinematics::DifferentialDrive;

/// The drivetrain collaborator driven by the controller.
///
/// Telemetry comes through [`TelemetrySource`]; outputs are per-side speed
/// commands in the same scale as a request's speed bounds. A zero command
/// coasts, it does not brake.
pub trait Drivetrain: TelemetrySource {
    fn geometry(&self) -> DifferentialDrive;

    fn drive(&self, left: f64, right: f64);

    fn stop(&self) {
        self.drive(0.0, 0.0);
    }
}
