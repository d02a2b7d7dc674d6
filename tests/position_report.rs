// Integration tests for M114 reply parsing

#[cfg(test)]
mod tests {
    use cmm_host::gcode::{AxisReading, PositionReport};
    use cmm_host::motion::{Axis, Position};

    #[test]
    fn test_marlin_reply() {
        let report = PositionReport::parse("X:10.00 Y:-2.50 Z:3.00 E:0.00 Count X:800 Y:-200 Z:1200");
        assert!(!report.is_degraded());
        assert_eq!(report.position(), Position::new(10.0, -2.5, 3.0));
    }

    #[test]
    fn test_one_bad_axis_keeps_the_others() {
        let report = PositionReport::parse("X:1.5 Y:abc Z:2");
        assert_eq!(report.x, AxisReading::Parsed(1.5));
        assert_eq!(report.y, AxisReading::Malformed);
        assert_eq!(report.degraded_axes(), vec![Axis::Y]);
        assert_eq!(report.position(), Position::new(1.5, 0.0, 2.0));
    }

    #[test]
    fn test_missing_axis_reads_zero() {
        let report = PositionReport::parse("X:4 Z:7");
        assert_eq!(report.y, AxisReading::Missing);
        assert_eq!(report.position(), Position::new(4.0, 0.0, 7.0));
    }

    #[test]
    fn test_garbage_never_fails() {
        for line in ["", "ok", "echo:busy: processing", ":::", "X: Y: Z:", "X:inf Y:NaN Z:1e400"] {
            let report = PositionReport::parse(line);
            assert!(report.is_degraded(), "{:?} should be degraded", line);
            assert!(report.position().x.is_finite());
            assert!(report.position().y.is_finite());
            assert!(report.position().z.is_finite());
        }
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let report = PositionReport::parse("x:1 y:2 z:3");
        assert_eq!(report.degraded_axes(), Axis::ALL.to_vec());
    }
}
