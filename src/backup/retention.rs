//! Grandfather-father-son retention over a snapshot catalog.
//!
//! Four calendar-aligned tiers are evaluated independently, then reconciled
//! in priority order (yearly, monthly, weekly, daily) so that a snapshot a
//! higher tier keeps is never deleted on behalf of a lower tier.
//!
//! # Cutoff
//!
//! For a tier with `keep` periods of `period_days` days each:
//!
//! ```text
//! cutoff = now - period_days * keep - period_days
//! ```
//!
//! The extra period is slack so that a snapshot taken just before the
//! nominal window opens is not deleted the moment the window moves.
//! Candidates strictly after the cutoff are kept, the rest are deleted.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::Catalog;
use super::instant::Instant;
use crate::error::{Error, Result};

/// A retention tier, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Yearly,
    Monthly,
    Weekly,
    Daily,
}

impl Tier {
    /// All tiers, highest priority first.
    pub const ALL: [Self; 4] = [Self::Yearly, Self::Monthly, Self::Weekly, Self::Daily];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown tier '{s}' (expected yearly, monthly, weekly or daily)"
                ))
            })
    }
}

/// How many periods a tier keeps, and how long a period is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub keep: u32,
    pub period_days: u32,
}

impl TierPolicy {
    #[must_use]
    pub const fn new(keep: u32, period_days: u32) -> Self {
        Self { keep, period_days }
    }

    /// Latest instant that is deleted, or `None` if the window reaches
    /// past the representable calendar (nothing is deleted).
    #[must_use]
    pub fn cutoff(&self, now: &Instant) -> Option<Instant> {
        let days = i64::from(self.period_days).checked_mul(i64::from(self.keep) + 1)?;
        now.checked_sub_days(days)
    }
}

/// Keep counts and period lengths for the four tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub yearly: TierPolicy,
    pub monthly: TierPolicy,
    pub weekly: TierPolicy,
    pub daily: TierPolicy,
    /// Day of the week a snapshot must fall on to count as weekly.
    pub weekly_anchor: Weekday,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            yearly: TierPolicy::new(10, 365),
            monthly: TierPolicy::new(6, 31),
            weekly: TierPolicy::new(4, 7),
            daily: TierPolicy::new(7, 1),
            weekly_anchor: Weekday::Mon,
        }
    }
}

impl RetentionPolicy {
    #[must_use]
    pub const fn tier(&self, tier: Tier) -> TierPolicy {
        match tier {
            Tier::Yearly => self.yearly,
            Tier::Monthly => self.monthly,
            Tier::Weekly => self.weekly,
            Tier::Daily => self.daily,
        }
    }

    /// Membership predicate: can `instant` be retained by `tier` at all?
    #[must_use]
    pub fn is_candidate(&self, tier: Tier, instant: &Instant) -> bool {
        match tier {
            Tier::Yearly => instant.month() == 1 && instant.day() == 1,
            Tier::Monthly => instant.day() == 1,
            Tier::Weekly => instant.weekday() == self.weekly_anchor,
            Tier::Daily => true,
        }
    }

    /// Reject policies whose periods are empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any tier has `period_days == 0`.
    pub fn validate(&self) -> Result<()> {
        for tier in Tier::ALL {
            if self.tier(tier).period_days == 0 {
                return Err(Error::Config(format!(
                    "retention.{tier}.period_days must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// One tier's view of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierDecision {
    pub tier: Tier,
    /// `None` when the window is unbounded.
    pub cutoff: Option<Instant>,
    /// Candidates after the cutoff, newest first.
    pub keep: Vec<Instant>,
    /// Candidates at or before the cutoff, newest first.
    pub delete: Vec<Instant>,
    /// `delete` minus everything a higher-priority tier keeps.
    pub reconciled: Vec<Instant>,
}

impl TierDecision {
    /// Number of candidates this tier considered.
    #[must_use]
    pub fn candidates(&self) -> usize {
        self.keep.len() + self.delete.len()
    }
}

/// Result of planning retention for one catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    pub now: Instant,
    decisions: Vec<TierDecision>,
    final_delete: BTreeSet<Instant>,
}

impl RetentionPlan {
    /// Per-tier decisions, highest priority first.
    #[must_use]
    pub fn decisions(&self) -> &[TierDecision] {
        &self.decisions
    }

    #[must_use]
    pub fn decision(&self, tier: Tier) -> &TierDecision {
        // Decisions are stored in `Tier::ALL` order.
        &self.decisions[tier as usize]
    }

    /// Snapshots to remove, oldest first.
    #[must_use]
    pub fn final_delete(&self) -> &BTreeSet<Instant> {
        &self.final_delete
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.final_delete.is_empty()
    }

    /// Highest-priority tier that keeps `instant`, if any.
    #[must_use]
    pub fn kept_by(&self, instant: &Instant) -> Option<Tier> {
        self.decisions
            .iter()
            .find(|d| d.keep.contains(instant))
            .map(|d| d.tier)
    }
}

/// Applies a [`RetentionPolicy`] to catalogs.
#[derive(Debug, Clone, Default)]
pub struct RetentionPlanner {
    policy: RetentionPolicy,
}

impl RetentionPlanner {
    #[must_use]
    pub const fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Partition one tier's candidates around its cutoff.
    #[must_use]
    pub fn decide(&self, tier: Tier, catalog: &Catalog, now: &Instant) -> TierDecision {
        let cutoff = self.policy.tier(tier).cutoff(now);
        let (keep, delete): (Vec<Instant>, Vec<Instant>) = catalog
            .sorted_desc()
            .into_iter()
            .filter(|instant| self.policy.is_candidate(tier, instant))
            .partition(|instant| cutoff.is_none_or(|cutoff| *instant > cutoff));

        TierDecision {
            tier,
            cutoff,
            keep,
            delete,
            reconciled: Vec::new(),
        }
    }

    /// Evaluate all tiers against `now` and reconcile them.
    #[must_use]
    pub fn plan(&self, catalog: &Catalog, now: &Instant) -> RetentionPlan {
        let mut decisions: Vec<TierDecision> = Tier::ALL
            .into_iter()
            .map(|tier| self.decide(tier, catalog, now))
            .collect();

        let mut protected: HashSet<Instant> = HashSet::new();
        for decision in &mut decisions {
            decision.reconciled = decision
                .delete
                .iter()
                .filter(|instant| !protected.contains(instant))
                .copied()
                .collect();
            protected.extend(decision.keep.iter().copied());

            debug!(
                tier = %decision.tier,
                cutoff = ?decision.cutoff.map(|c| c.to_string()),
                keep = decision.keep.len(),
                delete = decision.delete.len(),
                reconciled = decision.reconciled.len(),
                "Tier evaluated"
            );
        }

        let final_delete = decisions
            .iter()
            .flat_map(|d| d.reconciled.iter().copied())
            .collect();

        RetentionPlan {
            now: *now,
            decisions,
            final_delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::DateFormat;

    /// One snapshot per listed day, as left behind by years of daily runs
    /// that were already pruned down to a yearly/monthly skeleton.
    const HISTORY: [&str; 36] = [
        "20040101", "20050101", "20060101", "20070101", "20080101", "20090101", "20100101",
        "20110101", "20120101", "20130101", "20140101", "20150101", "20160101", "20160201",
        "20160411", "20170101", "20170701", "20170801", "20170901", "20171001", "20171101",
        "20171201", "20180101", "20180201", "20180301", "20180401", "20180402", "20180403",
        "20180404", "20180405", "20180406", "20180407", "20180408", "20180409", "20180410",
        "20180411",
    ];

    fn ymd(y: i32, m: u32, d: u32) -> Instant {
        Instant::from_ymd(y, m, d).unwrap()
    }

    fn history() -> Catalog {
        Catalog::build(HISTORY, &DateFormat::default()).unwrap()
    }

    fn plan_history() -> RetentionPlan {
        RetentionPlanner::default().plan(&history(), &ymd(2018, 4, 11))
    }

    fn names(instants: &[Instant]) -> Vec<String> {
        let format = DateFormat::default();
        instants.iter().map(|i| format.encode(i)).collect()
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("Weekly".parse::<Tier>().unwrap(), Tier::Weekly);
        assert!("hourly".parse::<Tier>().is_err());
    }

    #[test]
    fn test_cutoff_includes_one_period_of_slack() {
        let now = ymd(2018, 4, 11);
        assert_eq!(TierPolicy::new(7, 1).cutoff(&now), Some(ymd(2018, 4, 3)));
        assert_eq!(TierPolicy::new(4, 7).cutoff(&now), Some(ymd(2018, 3, 7)));
        assert_eq!(TierPolicy::new(6, 31).cutoff(&now), Some(ymd(2017, 9, 6)));
        assert_eq!(TierPolicy::new(u32::MAX, u32::MAX).cutoff(&now), None);
    }

    #[test]
    fn test_daily_tier() {
        let plan = plan_history();
        let daily = plan.decision(Tier::Daily);

        assert_eq!(
            names(&daily.keep),
            [
                "20180411", "20180410", "20180409", "20180408", "20180407", "20180406", "20180405",
                "20180404"
            ]
        );
        assert_eq!(daily.delete.len(), 28);
        assert_eq!(daily.delete[0], ymd(2018, 4, 3));
    }

    #[test]
    fn test_weekly_tier() {
        let plan = plan_history();
        let weekly = plan.decision(Tier::Weekly);

        assert_eq!(names(&weekly.keep), ["20180409", "20180402"]);
        assert_eq!(names(&weekly.delete), ["20180101", "20160411", "20160201", "20070101"]);
        // 2018-01-01 is claimed by the yearly tier.
        assert_eq!(names(&weekly.reconciled), ["20160411", "20160201", "20070101"]);
    }

    #[test]
    fn test_monthly_tier() {
        let plan = plan_history();
        let monthly = plan.decision(Tier::Monthly);

        assert_eq!(
            names(&monthly.keep),
            ["20180401", "20180301", "20180201", "20180101", "20171201", "20171101", "20171001"]
        );
        assert_eq!(monthly.delete.len(), 18);
        assert_eq!(
            names(&monthly.reconciled),
            [
                "20170901", "20170801", "20170701", "20160201", "20070101", "20060101", "20050101",
                "20040101"
            ]
        );
    }

    #[test]
    fn test_yearly_tier() {
        let plan = plan_history();
        let yearly = plan.decision(Tier::Yearly);

        let expected_keep: Vec<String> = (2008..=2018).rev().map(|y| format!("{y}0101")).collect();
        assert_eq!(names(&yearly.keep), expected_keep);
        assert_eq!(names(&yearly.delete), ["20070101", "20060101", "20050101", "20040101"]);
        assert_eq!(yearly.reconciled, yearly.delete);
    }

    #[test]
    fn test_full_history_cleanup() {
        let plan = plan_history();
        let deleted: Vec<String> = names(&plan.final_delete().iter().copied().collect::<Vec<_>>());

        assert_eq!(
            deleted,
            [
                "20040101", "20050101", "20060101", "20070101", "20160201", "20160411", "20170701",
                "20170801", "20170901", "20180403"
            ]
        );

        let kept: Vec<&str> = HISTORY
            .iter()
            .copied()
            .filter(|name| !deleted.iter().any(|d| d == name))
            .collect();
        assert_eq!(
            kept,
            [
                "20080101", "20090101", "20100101", "20110101", "20120101", "20130101", "20140101",
                "20150101", "20160101", "20170101", "20171001", "20171101", "20171201", "20180101",
                "20180201", "20180301", "20180401", "20180402", "20180404", "20180405", "20180406",
                "20180407", "20180408", "20180409", "20180410", "20180411"
            ]
        );
    }

    #[test]
    fn test_one_snapshot_per_day_since_2004() {
        let start = ymd(2004, 1, 1).date();
        let end = ymd(2018, 4, 11).date();
        let catalog: Catalog = start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(Instant::from)
            .collect();
        let plan = RetentionPlanner::default().plan(&catalog, &ymd(2018, 4, 11));

        assert_eq!(plan.decision(Tier::Yearly).keep.len(), 11);
        assert_eq!(plan.decision(Tier::Monthly).keep.len(), 7);
        assert_eq!(
            names(&plan.decision(Tier::Weekly).keep),
            ["20180409", "20180402", "20180326", "20180319", "20180312"]
        );
        assert_eq!(plan.decision(Tier::Daily).keep.len(), 8);

        // 2018-01-01 is a Monday past the weekly window, but yearly and
        // monthly keep it.
        let new_year = ymd(2018, 1, 1);
        assert!(plan.decision(Tier::Weekly).delete.contains(&new_year));
        assert!(!plan.decision(Tier::Weekly).reconciled.contains(&new_year));
        assert!(!plan.final_delete().contains(&new_year));

        assert_eq!(catalog.len() - plan.final_delete().len(), 29);
    }

    #[test]
    fn test_kept_by_reports_highest_tier() {
        let plan = plan_history();
        assert_eq!(plan.kept_by(&ymd(2018, 1, 1)), Some(Tier::Yearly));
        assert_eq!(plan.kept_by(&ymd(2018, 4, 1)), Some(Tier::Monthly));
        assert_eq!(plan.kept_by(&ymd(2018, 4, 2)), Some(Tier::Weekly));
        assert_eq!(plan.kept_by(&ymd(2018, 4, 10)), Some(Tier::Daily));
        assert_eq!(plan.kept_by(&ymd(2018, 4, 3)), None);
    }

    #[test]
    fn test_empty_catalog_is_noop() {
        let plan = RetentionPlanner::default().plan(&Catalog::default(), &ymd(2018, 4, 11));
        assert!(plan.is_noop());
        for decision in plan.decisions() {
            assert!(decision.keep.is_empty());
            assert!(decision.delete.is_empty());
        }
    }

    #[test]
    fn test_young_history_keeps_everything() {
        let catalog =
            Catalog::build(["20180409", "20180410", "20180411"], &DateFormat::default()).unwrap();
        let plan = RetentionPlanner::default().plan(&catalog, &ymd(2018, 4, 11));

        assert!(plan.is_noop());
        assert_eq!(plan.decision(Tier::Daily).keep.len(), 3);
    }

    #[test]
    fn test_zero_keep_still_keeps_one_period() {
        let policy = RetentionPolicy {
            daily: TierPolicy::new(0, 1),
            ..RetentionPolicy::default()
        };
        let catalog =
            Catalog::build(["20180409", "20180410", "20180411"], &DateFormat::default()).unwrap();
        let plan = RetentionPlanner::new(policy).plan(&catalog, &ymd(2018, 4, 11));

        assert_eq!(names(&plan.decision(Tier::Daily).keep), ["20180411"]);
        assert_eq!(plan.final_delete().len(), 1);
        assert!(plan.final_delete().contains(&ymd(2018, 4, 9)));
    }

    #[test]
    fn test_custom_weekly_anchor() {
        let policy = RetentionPolicy {
            weekly_anchor: Weekday::Sun,
            ..RetentionPolicy::default()
        };
        let plan = RetentionPlanner::new(policy).plan(&history(), &ymd(2018, 4, 11));
        // 2018-04-08 and 2018-04-01 are Sundays.
        assert_eq!(names(&plan.decision(Tier::Weekly).keep), ["20180408", "20180401"]);
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let policy = RetentionPolicy {
            monthly: TierPolicy::new(6, 0),
            ..RetentionPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(Error::Config(_))));
        assert!(RetentionPolicy::default().validate().is_ok());
    }

    /// Deterministic pseudo-random catalogs (xorshift) for invariant checks.
    fn scattered_catalog(seed: u64, len: usize) -> Catalog {
        let mut state = seed;
        let base = ymd(2000, 1, 1).date();
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let offset = u32::try_from(state % 7000).unwrap();
                Instant::from(base + chrono::Days::new(u64::from(offset)))
            })
            .collect()
    }

    #[test]
    fn test_invariants_over_scattered_catalogs() {
        let now = ymd(2019, 3, 1);
        let planner = RetentionPlanner::default();

        for seed in 1..=40u64 {
            let catalog = scattered_catalog(seed * 7919, 150);
            let plan = planner.plan(&catalog, &now);

            for decision in plan.decisions() {
                // keep and delete partition exactly the tier's candidates
                let mut expected: Vec<Instant> = catalog
                    .iter()
                    .copied()
                    .filter(|i| planner.policy().is_candidate(decision.tier, i))
                    .collect();
                expected.sort_unstable();
                let mut union: Vec<Instant> =
                    decision.keep.iter().chain(&decision.delete).copied().collect();
                union.sort_unstable();
                assert_eq!(union, expected);
                assert!(decision.keep.iter().all(|k| !decision.delete.contains(k)));
            }

            // Nothing a higher tier keeps is ever deleted by a lower one.
            for (rank, decision) in plan.decisions().iter().enumerate() {
                for lower in &plan.decisions()[rank + 1..] {
                    assert!(lower.reconciled.iter().all(|i| !decision.keep.contains(i)));
                }
            }
            let yearly = plan.decision(Tier::Yearly);
            assert!(yearly.keep.iter().all(|i| !plan.final_delete().contains(i)));
        }
    }
}
