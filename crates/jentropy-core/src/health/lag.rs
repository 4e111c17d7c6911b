//! Lag Predictor health test: maintains 8 candidate predictors, one per
//! lag distance 1..=8, and watches whether the best-performing predictor
//! is doing better than chance would allow over a window of 2^17
//! observations.

const HISTORY: usize = 8;
const WINDOW: u32 = 1 << 17;

/// Approximates, for each lag cutoff, a one-sided 2^-30 significance
/// bound the same way [`super::apt::cutoff`] does. `global` bounds the
/// total correct-prediction count across the whole window; `local`
/// bounds a single unbroken run of correct predictions, derived from the
/// geometric-distribution tail at the same significance.
fn cutoffs(osr: u32) -> (u32, u32) {
    let osr = osr.max(1) as f64;
    let w = WINDOW as f64;
    let p = 2f64.powf(-1.0 / osr);
    let mean = w * p;
    let sd = (w * p * (1.0 - p)).sqrt();
    let z = 11.0;
    let global = (mean + z * sd).ceil().max(1.0) as u32;
    let local = (-30.0 * std::f64::consts::LN_2 / (1.0 - p).ln())
        .ceil()
        .max(HISTORY as f64) as u32;
    (global, local)
}

#[derive(Debug, Clone)]
pub struct LagPredictor {
    history: [u64; HISTORY],
    head: usize,
    filled: u8,
    scoreboard: [u32; HISTORY],
    best_predictor: usize,
    success_count: u32,
    success_run: u32,
    observations: u32,
    global_cutoff: u32,
    local_cutoff: u32,
}

impl LagPredictor {
    pub fn new(osr: u32) -> Self {
        let (global_cutoff, local_cutoff) = cutoffs(osr);
        Self {
            history: [0; HISTORY],
            head: 0,
            filled: 0,
            scoreboard: [0; HISTORY],
            best_predictor: 0,
            success_count: 0,
            success_run: 0,
            observations: 0,
            global_cutoff,
            local_cutoff,
        }
    }

    pub fn update(&mut self, delta: u64) -> bool {
        let mut tripped = false;

        if self.filled as usize >= HISTORY {
            for (i, score) in self.scoreboard.iter_mut().enumerate() {
                let idx = (self.head + HISTORY - i) % HISTORY;
                if self.history[idx] == delta {
                    *score += 1;
                }
            }

            self.best_predictor = self
                .scoreboard
                .iter()
                .enumerate()
                .max_by_key(|&(_, &score)| score)
                .map(|(i, _)| i)
                .unwrap_or(0);

            let best_idx = (self.head + HISTORY - self.best_predictor) % HISTORY;
            if self.history[best_idx] == delta {
                self.success_count += 1;
                self.success_run += 1;
            } else {
                self.success_run = 0;
            }

            if self.success_count > self.global_cutoff || self.success_run > self.local_cutoff {
                tripped = true;
            }
        } else {
            self.filled += 1;
        }

        self.head = (self.head + 1) % HISTORY;
        self.history[self.head] = delta;

        self.observations += 1;
        if self.observations >= WINDOW {
            self.scoreboard = [0; HISTORY];
            self.success_count = 0;
            self.success_run = 0;
            self.observations = 0;
        }

        tripped
    }

    pub fn best_predictor(&self) -> usize {
        self.best_predictor
    }

    pub fn observations(&self) -> u32 {
        self.observations
    }
}
