use crate::rules::rule_for;
use crate::types::*;

/// Split `distribution_amount` of a service node's reward into per-address
/// payments under the rule in force at `hf_version`.
///
/// The result is deterministic and canonically ordered: operator first,
/// then contributors in composition order, zero amounts omitted. Amounts
/// always sum to `distribution_amount`.
pub fn calculate_rewards(
    hf_version: u8,
    distribution_amount: u64,
    node: &ServiceNodeInfo,
) -> Result<Vec<BatchPayment>, RewardsError> {
    let rule = rule_for(hf_version)?;
    let payments = rule.split(distribution_amount, node)?;

    debug_assert_eq!(payments_total(&payments), Some(distribution_amount));
    tracing::trace!(
        hf_version,
        rule = rule.name(),
        distribution_amount,
        payees = payments.len(),
        "reward split"
    );

    Ok(payments)
}
