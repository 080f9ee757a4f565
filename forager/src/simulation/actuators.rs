use super::environment::ResourceId;

/// The write side of a robot: motor command, beacon, outbound message slot,
/// tether requests, and named counter bumps. Controllers write here; the
/// robot entity and scheduler apply the effects in the same tick.
#[derive(Default)]
pub struct Actuators {
    motor_left: f32,
    motor_right: f32,
    beacon: bool,
    outbox: Option<String>,
    attach_request: Option<ResourceId>,
    detach_request: bool,
    counter_bumps: Vec<String>,
}

impl Actuators {
    /// Start-of-act reset: the outbox is a single slot overwritten each
    /// tick. Motor values and the beacon persist until changed.
    pub(crate) fn begin_tick(&mut self) {
        self.outbox = None;
    }

    /// Command the differential drive. Values are clamped to [-1, 1].
    pub fn set_motor_values(&mut self, left: f32, right: f32) {
        self.motor_left = left.clamp(-1.0, 1.0);
        self.motor_right = right.clamp(-1.0, 1.0);
    }

    pub fn motors(&self) -> (f32, f32) {
        (self.motor_left, self.motor_right)
    }

    pub fn set_beacon(&mut self, on: bool) {
        self.beacon = on;
    }

    pub fn beacon(&self) -> bool {
        self.beacon
    }

    /// Fill (or clear) the single outbound message slot for this tick.
    pub fn set_message(&mut self, message: Option<String>) {
        self.outbox = message;
    }

    pub fn message(&self) -> Option<&str> {
        self.outbox.as_deref()
    }

    /// Request a tether to the given resource; applied by the robot entity
    /// after the controller returns. Re-attaching to the current resource is
    /// a no-op, attaching to a different one detaches first.
    pub fn attach_to_resource(&mut self, resource: ResourceId) {
        self.attach_request = Some(resource);
    }

    pub fn detach_from_resource(&mut self) {
        self.detach_request = true;
    }

    pub(crate) fn take_attach_request(&mut self) -> Option<ResourceId> {
        self.attach_request.take()
    }

    pub(crate) fn take_detach_request(&mut self) -> bool {
        std::mem::take(&mut self.detach_request)
    }

    /// Bump a named run counter; drained into the scheduler's report.
    pub fn increment_counter(&mut self, name: &str) {
        self.counter_bumps.push(name.to_string());
    }

    pub(crate) fn drain_counter_bumps(&mut self) -> std::vec::Drain<'_, String> {
        self.counter_bumps.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_values_clamped() {
        let mut actuators = Actuators::default();
        actuators.set_motor_values(2.5, -3.0);
        assert_eq!(actuators.motors(), (1.0, -1.0));
        actuators.set_motor_values(0.25, 0.75);
        assert_eq!(actuators.motors(), (0.25, 0.75));
    }

    #[test]
    fn test_outbox_is_overwritten_each_tick() {
        let mut actuators = Actuators::default();
        actuators.set_message(Some("hello".into()));
        assert_eq!(actuators.message(), Some("hello"));
        actuators.begin_tick();
        assert_eq!(actuators.message(), None);
    }

    #[test]
    fn test_motor_and_beacon_state_persists() {
        let mut actuators = Actuators::default();
        actuators.set_motor_values(0.5, 0.5);
        actuators.set_beacon(true);
        actuators.begin_tick();
        assert_eq!(actuators.motors(), (0.5, 0.5));
        assert!(actuators.beacon());
    }
}
