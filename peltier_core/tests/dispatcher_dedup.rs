//! Dedup invariant for arbitrary setpoint sequences.

use peltier_core::dispatcher::Dispatcher;
use peltier_core::mocks::RecordingPort;
use peltier_core::profile::round_tenth;
use proptest::prelude::*;

proptest! {
    #[test]
    fn consecutive_identical_setpoints_transmit_once(
        temps in prop::collection::vec(5.0f32..70.0, 1..40)
    ) {
        let (port, lines) = RecordingPort::new();
        let d = Dispatcher::new(Box::new(port));
        for &t in &temps {
            d.send_setpoint(t).unwrap();
        }

        let mut expected = Vec::new();
        let mut last = None;
        for &t in &temps {
            let q = round_tenth(t);
            if last != Some(q) {
                expected.push(format!("{q:.1}"));
                last = Some(q);
            }
        }
        prop_assert_eq!(&*lines.lock().unwrap(), &expected);
    }
}
