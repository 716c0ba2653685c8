/// A counter-example: one ternary frame per time step, each indexed by the
/// external AIGER input number. Frame 0 holds the initial-cycle choices;
/// after adaptation it is the latch initialisation vector. `loop_frame`
/// marks where a liveness lasso closes.
#[derive(Clone, Default, Debug)]
pub struct Trace {
    pub frames: Vec<Vec<Option<bool>>>,
    pub loop_frame: Option<usize>,
}

impl Trace {
    pub fn new(frames: Vec<Vec<Option<bool>>>) -> Self {
        Self {
            frames,
            loop_frame: None,
        }
    }
}

/// One link of the trace-adaptor chain: a patcher undoing the input
/// renaming of one circuit transformation.
#[derive(Clone, Debug)]
pub enum TraceAdaptor {
    AigerInit(AigerInitAdaptor),
    FrameSplit(FrameSplitAdaptor),
}

impl TraceAdaptor {
    pub fn patch(&self, frames: &mut Vec<Vec<Option<bool>>>) {
        match self {
            TraceAdaptor::AigerInit(a) => a.patch(frames),
            TraceAdaptor::FrameSplit(a) => a.patch(frames),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct FlopInit {
    val: Option<bool>,
    x_id: u32,
}

/// Rewrites frame 0 from the init arena's input coordinates back to AIGER's
/// latch-init contract: one entry per flop, either the declared constant or
/// the value the solver chose for the flop's x-input.
#[derive(Clone, Default, Debug)]
pub struct AigerInitAdaptor {
    flop_init: Vec<FlopInit>,
}

impl AigerInitAdaptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the k-th flop's initialisation: a constant, or `None` with the
    /// init-arena input number that materialises the arbitrary value.
    pub fn flop(&mut self, val: Option<bool>, x_id: u32) {
        self.flop_init.push(FlopInit { val, x_id });
    }

    fn patch(&self, frames: &mut Vec<Vec<Option<bool>>>) {
        if frames.is_empty() {
            frames.push(Vec::new());
        }
        let prv_zero = &frames[0];
        let new_zero = self
            .flop_init
            .iter()
            .map(|f| match f.val {
                Some(v) => Some(v),
                None => prv_zero.get(f.x_id as usize).copied().flatten(),
            })
            .collect();
        frames[0] = new_zero;
    }
}

/// Undoes one round of temporal decomposition: frame 0 entries past `at`
/// were a whole peeled main-arena cycle, renumbered into the frame-0 space;
/// split them back out as a fresh frame 1 of `width` inputs.
#[derive(Clone, Copy, Debug)]
pub struct FrameSplitAdaptor {
    pub at: usize,
    pub width: usize,
}

impl FrameSplitAdaptor {
    fn patch(&self, frames: &mut Vec<Vec<Option<bool>>>) {
        if frames.is_empty() {
            frames.push(Vec::new());
        }
        let mut zero = std::mem::take(&mut frames[0]);
        zero.resize(self.at + self.width, None);
        let peeled = zero.split_off(self.at);
        frames[0] = zero;
        frames.insert(1, peeled);
    }
}
