// Compatibility Resolver
// Classifies an active signal as executable / notify-only / blocked for the
// user's primary broker and subscription tier

use tracing::debug;

use common::{BrokerAccount, Compatibility, Signal, SubscriptionTier};

pub struct CompatibilityResolver;

impl CompatibilityResolver {
    /// Classify one signal against the current broker and tier state.
    ///
    /// Callers must pass fresh collaborator data on every execution-planning
    /// attempt: a classification recorded during the cycle is advisory only,
    /// since the broker connection may have changed since.
    pub fn classify(
        signal: &Signal,
        primary_account: Option<&BrokerAccount>,
        tier: SubscriptionTier,
    ) -> Compatibility {
        let account = match primary_account {
            Some(account) if account.is_connected() => account,
            Some(_) => {
                return Compatibility::NotifyOnly {
                    reason: "primary broker account is not connected; reconnect to enable \
                             live execution"
                        .to_string(),
                }
            }
            None => {
                return Compatibility::NotifyOnly {
                    reason: "no primary broker account linked; link a broker to enable live \
                             execution"
                        .to_string(),
                }
            }
        };

        let segment = signal.required_segment();
        if !account.supports(segment) {
            return Compatibility::Blocked {
                reason: format!(
                    "broker {} does not support the {:?} segment required by this signal",
                    account.broker, segment
                ),
            };
        }

        if !tier.allows_live_execution() {
            return Compatibility::NotifyOnly {
                reason: format!(
                    "{tier:?} plan does not include live execution; upgrade to execute \
                     signals directly"
                ),
            };
        }

        debug!(signal_id = %signal.id, broker = %account.broker, "signal is executable");
        Compatibility::Executable
    }
}
