// Integration tests for the rectangle scan, driven against the simulated machine

#[cfg(test)]
mod tests {
    use cmm_host::config::ScanConfig;
    use cmm_host::file_manager;
    use cmm_host::gcode::{GcodeLink, LinkTiming};
    use cmm_host::hardware::{SimHandle, SimulatedMachine};
    use cmm_host::input::{Direction, ScanInput, Step};
    use cmm_host::motion::{Axis, MotionController, Position};
    use cmm_host::scan::{RectangleScan, ScanState, ScanStep};
    use cmm_host::session::SessionError;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn create_test_layout() -> ScanConfig {
        ScanConfig {
            points_x: 3,
            points_y: 2,
            dist_x: 100.0,
            dist_y: 50.0,
        }
    }

    async fn create_started_motion() -> (MotionController, SimHandle) {
        let (sim, handle) = SimulatedMachine::new();
        let link = GcodeLink::new(Box::new(sim), LinkTiming::immediate());
        let mut motion = MotionController::new(link);
        motion.start().await.unwrap();
        handle.clear_log();
        (motion, handle)
    }

    /// Calibrate to (0, 0, 5) and accept.
    async fn create_measuring_scan(motion: &mut MotionController, output: PathBuf) -> RectangleScan {
        let mut scan = RectangleScan::new(create_test_layout(), output);
        scan.begin_calibration();
        for _ in 0..5 {
            scan.handle(motion, ScanInput::Calibrate(Axis::Z, Direction::Positive))
                .await
                .unwrap();
        }
        let step = scan.handle(motion, ScanInput::Accept).await.unwrap();
        assert_eq!(
            step,
            ScanStep::Accepted {
                start: Position::new(0.0, 0.0, 5.0),
                points: 6
            }
        );
        scan
    }

    #[tokio::test]
    async fn test_calibration_steps() {
        let (mut motion, handle) = create_started_motion().await;
        let mut scan = RectangleScan::new(create_test_layout(), PathBuf::from("unused.csv"));
        assert_eq!(scan.state(), ScanState::AwaitingCalibration);
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Accept).await.unwrap(),
            ScanStep::Ignored
        );

        scan.begin_calibration();
        assert_eq!(scan.state(), ScanState::Calibrating);
        scan.handle(&mut motion, ScanInput::Calibrate(Axis::X, Direction::Positive))
            .await
            .unwrap();
        scan.handle(&mut motion, ScanInput::Calibrate(Axis::Y, Direction::Negative))
            .await
            .unwrap();
        scan.handle(&mut motion, ScanInput::Calibrate(Axis::Z, Direction::Positive))
            .await
            .unwrap();
        assert_eq!(motion.position(), Position::new(5.0, -5.0, 1.0));
        assert_eq!(handle.sent_commands(), vec!["G0 X5", "G0 Y-5", "G0 Z1"]);

        // Measuring keys mean nothing yet.
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Save).await.unwrap(),
            ScanStep::Ignored
        );
    }

    #[tokio::test]
    async fn test_accept_moves_to_first_point() {
        let dir = tempdir().unwrap();
        let (mut motion, handle) = create_started_motion().await;
        let scan = create_measuring_scan(&mut motion, dir.path().join("scan.csv")).await;

        assert_eq!(scan.state(), ScanState::Measuring);
        assert_eq!(scan.index(), 0);
        assert_eq!(scan.grid().map(|g| g.len()), Some(6));
        assert_eq!(scan.slots().unset_count(), 6);
        let sent = handle.sent_commands();
        assert_eq!(&sent[sent.len() - 2..], ["G0 Z5", "G0 X0 Y0"]);
    }

    #[tokio::test]
    async fn test_navigation_clamps_at_both_ends() {
        let dir = tempdir().unwrap();
        let (mut motion, handle) = create_started_motion().await;
        let mut scan = create_measuring_scan(&mut motion, dir.path().join("scan.csv")).await;
        handle.clear_log();

        assert_eq!(
            scan.handle(&mut motion, ScanInput::Previous).await.unwrap(),
            ScanStep::Clamped
        );
        assert_eq!(scan.index(), 0);
        assert!(handle.sent_commands().is_empty());

        for expected in 1..6 {
            scan.handle(&mut motion, ScanInput::Next).await.unwrap();
            assert_eq!(scan.index(), expected);
        }
        handle.clear_log();
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Next).await.unwrap(),
            ScanStep::Clamped
        );
        assert_eq!(scan.index(), 5);
        assert!(handle.sent_commands().is_empty());
        assert_eq!(scan.state(), ScanState::Measuring);
    }

    #[tokio::test]
    async fn test_navigation_restores_scan_height() {
        let dir = tempdir().unwrap();
        let (mut motion, handle) = create_started_motion().await;
        let mut scan = create_measuring_scan(&mut motion, dir.path().join("scan.csv")).await;

        scan.handle(&mut motion, ScanInput::AdjustZ(Step::Fine, Direction::Negative))
            .await
            .unwrap();
        scan.handle(&mut motion, ScanInput::AdjustZ(Step::Coarse, Direction::Negative))
            .await
            .unwrap();
        assert_eq!(motion.position(), Position::new(0.0, 0.0, 3.9));

        handle.clear_log();
        let step = scan.handle(&mut motion, ScanInput::Next).await.unwrap();
        assert_eq!(step, ScanStep::Moved(Position::new(0.0, 50.0, 5.0)));
        assert_eq!(handle.sent_commands(), vec!["G0 Z5", "G0 X0 Y50"]);
        assert_eq!(handle.position(), Position::new(0.0, 50.0, 5.0));
    }

    #[tokio::test]
    async fn test_completes_exactly_once() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("scan.csv");
        let (mut motion, handle) = create_started_motion().await;
        let mut scan = create_measuring_scan(&mut motion, output.clone()).await;

        for index in 0..5 {
            let step = scan.handle(&mut motion, ScanInput::Save).await.unwrap();
            assert!(matches!(step, ScanStep::Saved { index: i, .. } if i == index));
            assert_eq!(scan.state(), ScanState::Measuring);
            assert!(!output.exists());
        }
        handle.clear_log();
        let step = scan.handle(&mut motion, ScanInput::Save).await.unwrap();
        assert_eq!(step, ScanStep::Completed { rows: 6, unset: 0 });
        assert_eq!(scan.state(), ScanState::Complete);
        assert_eq!(handle.sent_commands(), vec!["G0 Z5", "G0 X0 Y0", "G0 Z0"]);
        assert_eq!(motion.position(), Position::origin());

        let rows = file_manager::read_datapoints(&output).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[5], Some(Position::new(100.0, 50.0, 5.0)));

        // Terminal: nothing else happens.
        handle.clear_log();
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Save).await.unwrap(),
            ScanStep::Ignored
        );
        assert!(handle.sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_skipped_points_are_written_as_sentinel() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("scan.csv");
        let (mut motion, _handle) = create_started_motion().await;
        let mut scan = create_measuring_scan(&mut motion, output.clone()).await;

        for _ in 0..5 {
            scan.handle(&mut motion, ScanInput::Next).await.unwrap();
        }
        let step = scan.handle(&mut motion, ScanInput::Save).await.unwrap();
        assert_eq!(step, ScanStep::Completed { rows: 6, unset: 5 });

        let text = tokio::fs::read_to_string(&output).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "X,Y,Z");
        assert_eq!(lines[1], "NaN,NaN,NaN");
        assert_eq!(lines[6], "100,50,5");
    }

    #[tokio::test]
    async fn test_resave_overwrites_slot() {
        let dir = tempdir().unwrap();
        let (mut motion, _handle) = create_started_motion().await;
        let mut scan = create_measuring_scan(&mut motion, dir.path().join("scan.csv")).await;

        scan.handle(&mut motion, ScanInput::Save).await.unwrap();
        scan.handle(&mut motion, ScanInput::Previous).await.unwrap();
        scan.handle(&mut motion, ScanInput::AdjustZ(Step::Coarse, Direction::Negative))
            .await
            .unwrap();
        scan.handle(&mut motion, ScanInput::Save).await.unwrap();

        assert_eq!(scan.slots().get(0), Some(Position::new(0.0, 0.0, 4.0)));
        assert_eq!(scan.index(), 1);
        assert_eq!(scan.slots().unset_count(), 5);
    }

    #[tokio::test]
    async fn test_quit_confirmation() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("scan.csv");
        let (mut motion, _handle) = create_started_motion().await;
        let mut scan = create_measuring_scan(&mut motion, output.clone()).await;

        assert_eq!(
            scan.handle(&mut motion, ScanInput::Quit).await.unwrap(),
            ScanStep::ConfirmQuit
        );
        assert_eq!(scan.state(), ScanState::Aborting);
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Save).await.unwrap(),
            ScanStep::Reprompt
        );
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Confirm(false)).await.unwrap(),
            ScanStep::QuitCancelled
        );
        assert_eq!(scan.state(), ScanState::Measuring);

        scan.handle(&mut motion, ScanInput::Quit).await.unwrap();
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Confirm(true)).await.unwrap(),
            ScanStep::Aborted
        );
        assert_eq!(scan.state(), ScanState::Aborted);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_quit_during_calibration_is_immediate() {
        let (mut motion, handle) = create_started_motion().await;
        let mut scan = RectangleScan::new(create_test_layout(), PathBuf::from("unused.csv"));
        scan.begin_calibration();
        assert_eq!(
            scan.handle(&mut motion, ScanInput::Quit).await.unwrap(),
            ScanStep::Aborted
        );
        assert_eq!(scan.state(), ScanState::Aborted);
        assert!(handle.sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_failed_final_write_still_parks() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("missing").join("scan.csv");
        let (mut motion, handle) = create_started_motion().await;
        let mut scan = create_measuring_scan(&mut motion, output.clone()).await;

        for _ in 0..5 {
            scan.handle(&mut motion, ScanInput::Save).await.unwrap();
        }
        let result = scan.handle(&mut motion, ScanInput::Save).await;
        assert!(matches!(result, Err(SessionError::Store(_))));
        assert_eq!(scan.state(), ScanState::Complete);
        assert_eq!(scan.slots().unset_count(), 0);
        assert_eq!(handle.position(), Position::origin());
        assert!(!output.exists());
    }
}
