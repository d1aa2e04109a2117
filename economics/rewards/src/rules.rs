use crate::types::*;

/// First hard fork at which service-node rewards accrue in the batching
/// ledger instead of being paid directly in every coinbase.
pub const BATCHING_HF_VERSION: u8 = 19;

/// Hard fork at which operator fees switched from portions to basis points.
pub const BASIS_POINTS_HF_VERSION: u8 = 21;

/// Denominator of a portions-denominated operator fee.
pub const STAKING_PORTIONS: u64 = 0xffff_ffff_ffff_fffc;

/// Denominator of a basis-points-denominated operator fee.
pub const BASIS_POINTS: u64 = 10_000;

/// One historical reward-split formula.
///
/// Every variant that was ever active on chain stays registered in
/// [`REWARD_RULES`] so old blocks replay bit-exactly.
pub trait RewardRule: Sync {
    /// Hard fork version this rule activates at.
    fn activation(&self) -> u8;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Denominator of `ServiceNodeInfo::fee` under this rule.
    fn fee_denominator(&self) -> u64;

    /// Split `distribution_amount` between the operator and contributors.
    ///
    /// The returned amounts always sum to `distribution_amount`.
    fn split(
        &self,
        distribution_amount: u64,
        node: &ServiceNodeInfo,
    ) -> Result<Vec<BatchPayment>, RewardsError>;
}

/// Hard fork 19-20: fee in portions, division remainder to the operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortionsRule;

/// Hard fork 21 onwards: fee in basis points, division remainder to the
/// contributor with the largest stake.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasisPointsRule;

/// Every reward rule, ordered by activation.
pub static REWARD_RULES: &[&dyn RewardRule] = &[&PortionsRule, &BasisPointsRule];

/// Resolve the rule in force at `hf_version`.
pub fn rule_for(hf_version: u8) -> Result<&'static dyn RewardRule, RewardsError> {
    REWARD_RULES
        .iter()
        .rev()
        .find(|rule| rule.activation() <= hf_version)
        .copied()
        .ok_or(RewardsError::UnsupportedHardFork(hf_version))
}

/// `a * b / denominator` with a 128-bit intermediate.
fn mul_div(a: u64, b: u64, denominator: u64) -> Result<u64, RewardsError> {
    if denominator == 0 {
        return Err(RewardsError::Overflow);
    }
    let q = (a as u128) * (b as u128) / (denominator as u128);
    u64::try_from(q).map_err(|_| RewardsError::Overflow)
}

fn operator_fee(rule: &dyn RewardRule, amount: u64, node: &ServiceNodeInfo) -> Result<u64, RewardsError> {
    let denominator = rule.fee_denominator();
    if node.fee > denominator {
        return Err(RewardsError::InvalidFee {
            fee: node.fee,
            denominator,
        });
    }
    mul_div(node.fee, amount, denominator)
}

/// Pro-rata shares of `pool` by stake, plus the undistributed remainder.
/// With no stake at all, every share is zero and the whole pool remains.
fn pro_rata(pool: u64, node: &ServiceNodeInfo) -> Result<(Vec<u64>, u64), RewardsError> {
    let total = node.total_contributed()?;
    if total == 0 {
        return Ok((vec![0; node.contributors.len()], pool));
    }

    let mut shares = Vec::with_capacity(node.contributors.len());
    let mut paid = 0u64;
    for contributor in &node.contributors {
        let share = mul_div(contributor.amount, pool, total)?;
        paid = paid.checked_add(share).ok_or(RewardsError::Overflow)?;
        shares.push(share);
    }
    let remainder = pool.checked_sub(paid).ok_or(RewardsError::Overflow)?;
    Ok((shares, remainder))
}

/// Operator first, then contributors in composition order. Zero amounts are
/// left out.
fn assemble(node: &ServiceNodeInfo, operator_amount: u64, shares: &[u64]) -> Vec<BatchPayment> {
    let mut payments = Vec::with_capacity(shares.len() + 1);
    if operator_amount > 0 {
        payments.push(BatchPayment::new(node.operator.clone(), operator_amount));
    }
    for (contributor, share) in node.contributors.iter().zip(shares) {
        if *share > 0 {
            payments.push(BatchPayment::new(contributor.address.clone(), *share));
        }
    }
    payments
}

impl RewardRule for PortionsRule {
    fn activation(&self) -> u8 {
        BATCHING_HF_VERSION
    }

    fn name(&self) -> &'static str {
        "portions"
    }

    fn fee_denominator(&self) -> u64 {
        STAKING_PORTIONS
    }

    fn split(
        &self,
        distribution_amount: u64,
        node: &ServiceNodeInfo,
    ) -> Result<Vec<BatchPayment>, RewardsError> {
        let fee = operator_fee(self, distribution_amount, node)?;
        let (shares, remainder) = pro_rata(distribution_amount - fee, node)?;
        let operator_amount = fee.checked_add(remainder).ok_or(RewardsError::Overflow)?;
        Ok(assemble(node, operator_amount, &shares))
    }
}

impl RewardRule for BasisPointsRule {
    fn activation(&self) -> u8 {
        BASIS_POINTS_HF_VERSION
    }

    fn name(&self) -> &'static str {
        "basis-points"
    }

    fn fee_denominator(&self) -> u64 {
        BASIS_POINTS
    }

    fn split(
        &self,
        distribution_amount: u64,
        node: &ServiceNodeInfo,
    ) -> Result<Vec<BatchPayment>, RewardsError> {
        let mut fee = operator_fee(self, distribution_amount, node)?;
        let (mut shares, remainder) = pro_rata(distribution_amount - fee, node)?;

        // Earliest contributor wins a tie on stake.
        let mut largest: Option<(usize, u64)> = None;
        for (i, contributor) in node.contributors.iter().enumerate() {
            if contributor.amount > largest.map_or(0, |(_, amount)| amount) {
                largest = Some((i, contributor.amount));
            }
        }

        match largest {
            Some((i, _)) => shares[i] = shares[i].checked_add(remainder).ok_or(RewardsError::Overflow)?,
            None => fee = fee.checked_add(remainder).ok_or(RewardsError::Overflow)?,
        }
        Ok(assemble(node, fee, &shares))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(fee: u64, stakes: &[(&str, u64)]) -> ServiceNodeInfo {
        ServiceNodeInfo {
            operator: Address::from("op"),
            fee,
            contributors: stakes
                .iter()
                .map(|(address, amount)| Contributor {
                    address: Address::from(*address),
                    amount: *amount,
                })
                .collect(),
        }
    }

    fn amounts(payments: &[BatchPayment]) -> Vec<(&str, u64)> {
        payments.iter().map(|p| (p.address.as_str(), p.amount)).collect()
    }

    // --- rule table ---

    #[test]
    fn rule_lookup_by_hard_fork() {
        assert_eq!(rule_for(19).unwrap().name(), "portions");
        assert_eq!(rule_for(20).unwrap().name(), "portions");
        assert_eq!(rule_for(21).unwrap().name(), "basis-points");
        assert_eq!(rule_for(u8::MAX).unwrap().name(), "basis-points");
    }

    #[test]
    fn pre_batching_fork_has_no_rule() {
        assert!(matches!(rule_for(18), Err(RewardsError::UnsupportedHardFork(18))));
        assert!(rule_for(0).is_err());
    }

    #[test]
    fn rules_are_ordered_by_activation() {
        for pair in REWARD_RULES.windows(2) {
            assert!(pair[0].activation() < pair[1].activation());
        }
    }

    // --- portions rule ---

    #[test]
    fn portions_remainder_goes_to_operator() {
        let payments = PortionsRule.split(100, &node(0, &[("a", 1), ("b", 2)])).unwrap();
        assert_eq!(amounts(&payments), vec![("op", 1), ("a", 33), ("b", 66)]);
    }

    #[test]
    fn portions_half_fee() {
        let half = STAKING_PORTIONS / 2;
        let payments = PortionsRule.split(1000, &node(half, &[("a", 1), ("b", 2)])).unwrap();
        // 500 fee, 500 pool -> 166 + 333, remainder 1 back to the operator.
        assert_eq!(amounts(&payments), vec![("op", 501), ("a", 166), ("b", 333)]);
    }

    #[test]
    fn portions_full_fee_pays_only_operator() {
        let payments = PortionsRule
            .split(12_345, &node(STAKING_PORTIONS, &[("a", 10), ("b", 20)]))
            .unwrap();
        assert_eq!(amounts(&payments), vec![("op", 12_345)]);
    }

    #[test]
    fn portions_fee_above_denominator_rejected() {
        let mut n = node(0, &[("a", 1)]);
        n.fee = u64::MAX;
        assert!(matches!(
            PortionsRule.split(10, &n),
            Err(RewardsError::InvalidFee { .. })
        ));
    }

    // --- basis points rule ---

    #[test]
    fn basis_points_even_split() {
        let payments = BasisPointsRule
            .split(1000, &node(1000, &[("a", 1), ("b", 1), ("c", 1)]))
            .unwrap();
        assert_eq!(amounts(&payments), vec![("op", 100), ("a", 300), ("b", 300), ("c", 300)]);
    }

    #[test]
    fn basis_points_remainder_tie_goes_to_earliest() {
        let payments = BasisPointsRule
            .split(1001, &node(1000, &[("a", 1), ("b", 1), ("c", 1)]))
            .unwrap();
        assert_eq!(amounts(&payments), vec![("op", 100), ("a", 301), ("b", 300), ("c", 300)]);
    }

    #[test]
    fn basis_points_remainder_goes_to_largest_stake() {
        let payments = BasisPointsRule
            .split(10, &node(0, &[("a", 1), ("b", 5), ("c", 5)]))
            .unwrap();
        // a rounds to zero and is omitted; b takes the remainder of 2.
        assert_eq!(amounts(&payments), vec![("b", 6), ("c", 4)]);
    }

    #[test]
    fn basis_points_without_stake_pays_operator() {
        let payments = BasisPointsRule.split(777, &node(2500, &[])).unwrap();
        assert_eq!(amounts(&payments), vec![("op", 777)]);

        let payments = BasisPointsRule.split(777, &node(0, &[("a", 0)])).unwrap();
        assert_eq!(amounts(&payments), vec![("op", 777)]);
    }

    #[test]
    fn basis_points_fee_above_denominator_rejected() {
        assert_eq!(
            BasisPointsRule.split(10, &node(10_001, &[("a", 1)])),
            Err(RewardsError::InvalidFee {
                fee: 10_001,
                denominator: BASIS_POINTS,
            })
        );
    }

    #[test]
    fn zero_distribution_yields_nothing() {
        for rule in REWARD_RULES {
            let payments = rule.split(0, &node(0, &[("a", 3), ("b", 4)])).unwrap();
            assert!(payments.is_empty(), "rule {}", rule.name());
        }
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        for rule in REWARD_RULES {
            let n = node(rule.fee_denominator() / 3, &[("a", u64::MAX / 2), ("b", u64::MAX / 2)]);
            let payments = rule.split(u64::MAX, &n).unwrap();
            assert_eq!(payments_total(&payments), Some(u64::MAX), "rule {}", rule.name());
        }
    }
}
