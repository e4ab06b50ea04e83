//! Frame loop wiring scene -> perception -> simulation
//!
//! The caller feeds wall-clock frame times; the runner turns them into fixed
//! `SIM_DT` ticks through an accumulator. Perception either runs inline every
//! `cadence_ticks` ticks or on the background worker.

use image::RgbImage;

use crate::consts::SIM_DT;
use crate::error::SimResult;
use crate::perception::{PerceptionPipeline, PerceptionWorker};
use crate::scene::{Overlay, SceneRenderer, SpritePose};
use crate::settings::SimConfig;
use crate::sim::{ModeSelect, SimSnapshot, Simulation, TickInput};

/// Cap on ticks per `update` so a long stall doesn't spiral
const MAX_SUBSTEPS: u32 = 8;

/// Where perception runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerceptionMode {
    /// Inline, before the tick, every `cadence_ticks`
    #[default]
    Synchronous,
    /// On the worker thread; the latest finished result is used
    Threaded,
}

pub struct Runner {
    sim: Simulation,
    scene: SceneRenderer,
    pipeline: PerceptionPipeline,
    worker: Option<PerceptionWorker>,
    accumulator: f64,
    input: TickInput,
}

impl Runner {
    pub fn new(config: SimConfig, mode: PerceptionMode) -> SimResult<Self> {
        let sim = Simulation::new(config)?;
        let config = sim.config();
        let scene = SceneRenderer::new(config.screen_width, config.screen_height, sim.road().clone());
        let pipeline = PerceptionPipeline::new(config.perception.clone());
        let worker = match mode {
            PerceptionMode::Synchronous => None,
            PerceptionMode::Threaded => Some(PerceptionWorker::spawn(pipeline.clone())?),
        };
        log::info!("Runner started ({mode:?} perception)");
        Ok(Self {
            sim,
            scene,
            pipeline,
            worker,
            accumulator: 0.0,
            input: TickInput::default(),
        })
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    /// Input used for the coming ticks; one-shot events are cleared once consumed
    pub fn input_mut(&mut self) -> &mut TickInput {
        &mut self.input
    }

    pub fn select_mode(&mut self, event: ModeSelect) {
        self.input.mode_select = Some(event);
    }

    /// Refresh the lane estimate ahead of a tick
    fn perceive(&mut self) -> SimResult<()> {
        match &mut self.worker {
            Some(worker) => {
                if let Some(result) = worker.latest() {
                    self.sim.apply_perception(result)?;
                }
                if self.sim.should_perceive() {
                    let frame = self.scene.render(self.sim.state())?;
                    worker.submit(frame)?;
                }
            }
            None => {
                if self.sim.should_perceive() {
                    let frame = self.scene.render(self.sim.state())?;
                    let result = self.pipeline.process(&frame);
                    self.sim.apply_perception(result)?;
                }
            }
        }
        Ok(())
    }

    /// Run exactly one fixed tick
    pub fn step(&mut self) -> SimResult<SimSnapshot> {
        self.perceive()?;
        let input = self.input;
        self.sim.tick(&input, SIM_DT)?;
        self.input.mode_select = None;
        self.input.reset_controls = false;
        Ok(self.sim.snapshot())
    }

    /// Consume `frame_dt` of wall time; returns the number of ticks run.
    ///
    /// A frame contributes at most `MAX_SUBSTEPS` ticks of time, so a stalled
    /// clock slows the simulation down instead of building a backlog.
    pub fn update(&mut self, frame_dt: f64) -> SimResult<u32> {
        let max_frame = f64::from(MAX_SUBSTEPS) * SIM_DT;
        self.accumulator += if frame_dt.is_finite() { frame_dt.clamp(0.0, max_frame) } else { 0.0 };
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.step()?;
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        Ok(substeps)
    }

    /// Annotations for the current frame
    pub fn overlay(&self) -> Overlay {
        let config = self.sim.config();
        let segments = self.sim.observation().map(|o| o.segments.clone()).unwrap_or_default();
        let roi = self.pipeline.roi(config.screen_width, config.screen_height);
        let sprite = SpritePose::new(self.sim.state(), &self.sim.command());
        Overlay::new(segments, &roi, sprite)
    }

    /// Current scene with the overlay blended in
    pub fn annotated_frame(&self) -> SimResult<RgbImage> {
        let frame = self.scene.render(self.sim.state())?;
        Ok(self.overlay().annotate(&frame))
    }

    /// Stop the worker, if any
    pub fn shutdown(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            log::info!("Stopping perception worker ({} frames dropped)", worker.dropped_frames());
            worker.shutdown();
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::GearMode;

    #[test]
    fn test_synchronous_runner_perceives_lane() {
        let mut runner = Runner::new(SimConfig::default(), PerceptionMode::Synchronous).unwrap();
        let snapshot = runner.step().unwrap();
        assert_eq!(snapshot.tick, 1);
        let obs = snapshot.observation.expect("perception ran before the first tick");
        assert!(obs.lane_center.is_some());
        assert!(!runner.overlay().segments.is_empty());
    }

    #[test]
    fn test_update_runs_fixed_ticks() {
        let mut config = SimConfig::default();
        // skip perception work; only tick counting matters here
        config.perception.cadence_ticks = 1000;
        let mut runner = Runner::new(config, PerceptionMode::Synchronous).unwrap();
        assert_eq!(runner.update(SIM_DT * 0.5).unwrap(), 0);
        assert_eq!(runner.update(SIM_DT * 2.0).unwrap(), 2);
        assert_eq!(runner.sim().tick_count(), 2);
    }

    #[test]
    fn test_long_frames_do_not_build_backlog() {
        let mut config = SimConfig::default();
        config.perception.cadence_ticks = 1000;
        let mut runner = Runner::new(config, PerceptionMode::Synchronous).unwrap();
        for i in 0..50 {
            assert_eq!(runner.update(0.25).unwrap(), MAX_SUBSTEPS);
            assert!(runner.accumulator < SIM_DT, "frame {i}: {}", runner.accumulator);
        }
        assert_eq!(runner.sim().tick_count(), 50 * u64::from(MAX_SUBSTEPS));
        // a stalled clock only buys one frame's worth of ticks
        assert_eq!(runner.update(60.0).unwrap(), MAX_SUBSTEPS);
        assert_eq!(runner.update(0.0).unwrap(), 0);
    }

    #[test]
    fn test_mode_select_is_one_shot() {
        let mut config = SimConfig::default();
        config.perception.cadence_ticks = 1000;
        let mut runner = Runner::new(config, PerceptionMode::Synchronous).unwrap();
        runner.select_mode(ModeSelect::Park);
        runner.step().unwrap();
        assert_eq!(runner.sim().mode(), GearMode::Park);
        assert!(runner.input_mut().mode_select.is_none());
    }

    #[test]
    fn test_threaded_observation_reaches_simulation() {
        let mut runner = Runner::new(SimConfig::default(), PerceptionMode::Threaded).unwrap();
        let mut ticks = 0u64;
        while runner.sim().observation().is_none() {
            assert!(ticks < 2000, "no perception result after {ticks} ticks");
            let snapshot = runner.step().unwrap();
            ticks += 1;
            // ticks never wait on the worker
            assert_eq!(snapshot.tick, ticks);
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        // the first result comes from a frame submitted before tick 1
        assert!(ticks >= 2);
        let obs = runner.sim().observation().unwrap();
        assert!(obs.lane_center.is_some());
        assert!(!runner.overlay().segments.is_empty());
        runner.shutdown();
    }

    #[test]
    fn test_annotated_frame_matches_screen() {
        let mut runner = Runner::new(SimConfig::default(), PerceptionMode::Synchronous).unwrap();
        runner.step().unwrap();
        let img = runner.annotated_frame().unwrap();
        assert_eq!(img.dimensions(), (800, 600));
    }

    #[test]
    fn test_threaded_runner_shuts_down() {
        let mut config = SimConfig::default();
        config.screen_width = 160;
        config.screen_height = 120;
        let mut runner = Runner::new(config, PerceptionMode::Threaded).unwrap();
        for _ in 0..3 {
            runner.step().unwrap();
        }
        runner.shutdown();
        assert_eq!(runner.sim().tick_count(), 3);
    }
}
