// Integration tests for free manual control

#[cfg(test)]
mod tests {
    use cmm_host::gcode::{GcodeLink, LinkTiming};
    use cmm_host::hardware::{SimHandle, SimulatedMachine};
    use cmm_host::input::{Direction, JogInput, Step};
    use cmm_host::jog::{JogController, JogStep};
    use cmm_host::motion::{Axis, MotionController, Position};
    use tempfile::tempdir;

    async fn create_started_motion() -> (MotionController, SimHandle) {
        let (sim, handle) = SimulatedMachine::new();
        let link = GcodeLink::new(Box::new(sim), LinkTiming::immediate());
        let mut motion = MotionController::new(link);
        motion.start().await.unwrap();
        handle.clear_log();
        (motion, handle)
    }

    #[tokio::test]
    async fn test_jog_pairs() {
        let (mut motion, handle) = create_started_motion().await;
        let mut jog = JogController::new(std::path::PathBuf::from("unused.csv"));

        let moves = [
            JogInput::Jog(Axis::X, Step::Coarse, Direction::Positive),
            JogInput::Jog(Axis::X, Step::Fine, Direction::Negative),
            JogInput::Jog(Axis::Y, Step::Fine, Direction::Positive),
            JogInput::Jog(Axis::Z, Step::Coarse, Direction::Negative),
        ];
        for input in moves {
            jog.handle(&mut motion, input).await.unwrap();
        }
        assert_eq!(motion.position(), Position::new(0.9, 0.1, -1.0));
        assert_eq!(
            handle.sent_commands(),
            vec!["G0 X1", "G0 X0.9", "G0 Y0.1", "G0 Z-1"]
        );
        assert_eq!(handle.position(), motion.position());
    }

    #[tokio::test]
    async fn test_capture_and_undo() {
        let (mut motion, _handle) = create_started_motion().await;
        let mut jog = JogController::new(std::path::PathBuf::from("unused.csv"));

        jog.handle(&mut motion, JogInput::Jog(Axis::X, Step::Coarse, Direction::Positive))
            .await
            .unwrap();
        let step = jog.handle(&mut motion, JogInput::Capture).await.unwrap();
        assert_eq!(
            step,
            JogStep::Captured {
                count: 1,
                position: Position::new(1.0, 0.0, 0.0)
            }
        );
        jog.handle(&mut motion, JogInput::Jog(Axis::Y, Step::Fine, Direction::Positive))
            .await
            .unwrap();
        jog.handle(&mut motion, JogInput::Capture).await.unwrap();

        let step = jog.handle(&mut motion, JogInput::Undo).await.unwrap();
        assert_eq!(
            step,
            JogStep::Undone {
                removed: Some(Position::new(1.0, 0.1, 0.0)),
                count: 1
            }
        );
        assert_eq!(jog.log().points(), &[Position::new(1.0, 0.0, 0.0)]);
    }

    #[tokio::test]
    async fn test_undo_on_empty_log() {
        let (mut motion, handle) = create_started_motion().await;
        let mut jog = JogController::new(std::path::PathBuf::from("unused.csv"));
        let step = jog.handle(&mut motion, JogInput::Undo).await.unwrap();
        assert_eq!(step, JogStep::Undone { removed: None, count: 0 });
        assert!(jog.log().is_empty());
        assert!(handle.sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_session_running() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("free.csv");
        let (mut motion, _handle) = create_started_motion().await;
        let mut jog = JogController::new(output.clone());

        jog.handle(&mut motion, JogInput::Jog(Axis::Z, Step::Fine, Direction::Positive))
            .await
            .unwrap();
        jog.handle(&mut motion, JogInput::Capture).await.unwrap();
        assert_eq!(
            jog.handle(&mut motion, JogInput::Save).await.unwrap(),
            JogStep::Saved { rows: 1 }
        );
        assert!(!jog.is_finished());
        assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "X,Y,Z\n0,0,0.1\n");

        jog.handle(&mut motion, JogInput::Capture).await.unwrap();
        jog.handle(&mut motion, JogInput::Save).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&output).await.unwrap(),
            "X,Y,Z\n0,0,0.1\n0,0,0.1\n"
        );
    }

    #[tokio::test]
    async fn test_save_with_no_captures_writes_header() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("empty.csv");
        let (mut motion, _handle) = create_started_motion().await;
        let mut jog = JogController::new(output.clone());
        assert_eq!(
            jog.handle(&mut motion, JogInput::Save).await.unwrap(),
            JogStep::Saved { rows: 0 }
        );
        assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "X,Y,Z\n");
    }

    #[tokio::test]
    async fn test_quit_needs_confirmation() {
        let (mut motion, handle) = create_started_motion().await;
        let mut jog = JogController::new(std::path::PathBuf::from("unused.csv"));

        assert_eq!(jog.handle(&mut motion, JogInput::Quit).await.unwrap(), JogStep::ConfirmQuit);
        assert!(jog.is_confirming_quit());
        assert_eq!(
            jog.handle(&mut motion, JogInput::Jog(Axis::X, Step::Coarse, Direction::Positive))
                .await
                .unwrap(),
            JogStep::Reprompt
        );
        assert!(handle.sent_commands().is_empty());
        assert_eq!(
            jog.handle(&mut motion, JogInput::Confirm(false)).await.unwrap(),
            JogStep::QuitCancelled
        );
        assert!(!jog.is_finished());

        jog.handle(&mut motion, JogInput::Quit).await.unwrap();
        assert_eq!(
            jog.handle(&mut motion, JogInput::Confirm(true)).await.unwrap(),
            JogStep::Finished
        );
        assert!(jog.is_finished());
        assert_eq!(jog.handle(&mut motion, JogInput::Capture).await.unwrap(), JogStep::Ignored);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_points() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("missing").join("out.csv");
        let (mut motion, _handle) = create_started_motion().await;
        let mut jog = JogController::new(output.clone());

        jog.handle(&mut motion, JogInput::Jog(Axis::X, Step::Coarse, Direction::Positive))
            .await
            .unwrap();
        jog.handle(&mut motion, JogInput::Capture).await.unwrap();
        jog.handle(&mut motion, JogInput::Capture).await.unwrap();

        let step = jog.handle(&mut motion, JogInput::Save).await.unwrap();
        assert!(matches!(step, JogStep::SaveFailed(_)));
        assert!(!jog.is_finished());
        assert_eq!(jog.log().len(), 2);
        assert!(!output.exists());

        // Still usable, and a retry succeeds once the directory exists.
        jog.handle(&mut motion, JogInput::Undo).await.unwrap();
        tokio::fs::create_dir(dir.path().join("missing")).await.unwrap();
        assert_eq!(
            jog.handle(&mut motion, JogInput::Save).await.unwrap(),
            JogStep::Saved { rows: 1 }
        );
        assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "X,Y,Z\n1,0,0\n");
    }
}
