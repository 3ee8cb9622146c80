//! Per-cycle and per-active-period simulation statistics.

/// Monotonic whole-run CPU counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuStats {
    /// Total simulated cycles, including powered-off time.
    pub cycle_count: u64,
    /// Total retired instructions.
    pub instruction_count: u64,
}

/// Record of one powered run: everything between a restore and the next
/// power failure.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ActivePeriodStats {
    /// Cycles spent in this period, restore and backup penalties included.
    pub cycle_count: u64,
    /// Instructions retired in this period.
    pub instruction_count: u64,
    /// Energy charged for instruction execution in this period, in joules.
    pub instruction_energy: f64,
    /// Cycle gaps between consecutive backups taken during this period.
    pub backup_times: Vec<u64>,
}

/// Whole-run statistics bundle owned by the driver.
///
/// Invariant: the sum of `instruction_count` over `models` equals
/// `cpu.instruction_count`; a new model is appended by each restore and by
/// nothing else.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StatsBundle {
    /// Monotonic CPU totals.
    pub cpu: CpuStats,
    /// Number of ACTIVE → POWERED_OFF transitions.
    pub power_failures: u64,
    /// One record per active period, oldest first.
    pub models: Vec<ActivePeriodStats>,
}

impl StatsBundle {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new active-period model. Called exactly once per restore.
    pub fn begin_active_period(&mut self) {
        self.models.push(ActivePeriodStats::default());
    }

    /// The model of the ongoing active period.
    ///
    /// # Panics
    ///
    /// Panics when no restore has opened a period yet; reaching that state
    /// is a driver bug.
    #[must_use]
    pub fn current_model(&mut self) -> &mut ActivePeriodStats {
        self.models
            .last_mut()
            .expect("a restore opens an active period before it is charged")
    }

    /// Accounts simulated cycles outside any active period.
    pub const fn add_cycles(&mut self, cycles: u64) {
        self.cpu.cycle_count += cycles;
    }

    /// Accounts simulated cycles inside the current active period.
    pub fn add_active_cycles(&mut self, cycles: u64) {
        self.cpu.cycle_count += cycles;
        self.current_model().cycle_count += cycles;
    }

    /// Accounts one retired instruction and its cycle cost.
    pub fn record_instruction(&mut self, cycles: u64) {
        self.cpu.cycle_count += cycles;
        self.cpu.instruction_count += 1;
        let model = self.current_model();
        model.cycle_count += cycles;
        model.instruction_count += 1;
    }
}
