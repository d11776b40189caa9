//! The access decision function.
//!
//! `evaluate` is pure and total: every (route class, session state) pair
//! produces exactly one verdict, and the verdict depends on nothing else.

use super::route_class::RouteClass;

/// Session state resolved for one request and discarded afterwards.
///
/// Derived from a validated access token plus the current user record; an
/// absent or invalid token yields `anonymous()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub authenticated: bool,
    pub two_factor_required: bool,
    pub two_factor_verified: bool,
    pub profile_complete: bool,
}

impl SessionState {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            two_factor_required: false,
            two_factor_verified: false,
            profile_complete: false,
        }
    }
}

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    RedirectLogin,
    RedirectProfileCompletion,
    RedirectTwoFactor,
    RedirectProfile,
}

/// Decide access for a route class given the resolved session state.
///
/// Checks apply in a fixed order; the first that fires wins:
/// profile completion gates before the 2FA challenge, and the dedicated
/// pages bounce visitors whose state no longer needs them.
pub fn evaluate(route: RouteClass, state: SessionState) -> Verdict {
    match route {
        RouteClass::Protected => {
            if !state.authenticated {
                return Verdict::RedirectLogin;
            }
            if !state.profile_complete {
                return Verdict::RedirectProfileCompletion;
            }
            if state.two_factor_required && !state.two_factor_verified {
                return Verdict::RedirectTwoFactor;
            }
            Verdict::Allow
        }
        RouteClass::ProfileCompletion => {
            if state.profile_complete {
                Verdict::RedirectProfile
            } else {
                Verdict::Allow
            }
        }
        RouteClass::TwoFactorChallenge => {
            if !state.two_factor_required || state.two_factor_verified {
                Verdict::RedirectProfile
            } else {
                Verdict::Allow
            }
        }
        RouteClass::AuthEntry => {
            if !state.authenticated {
                return Verdict::Allow;
            }
            // Route an already-authenticated visitor to wherever their
            // standing requires next.
            if !state.profile_complete {
                return Verdict::RedirectProfileCompletion;
            }
            if state.two_factor_required && !state.two_factor_verified {
                return Verdict::RedirectTwoFactor;
            }
            Verdict::RedirectProfile
        }
        RouteClass::Public => Verdict::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROUTES: [RouteClass; 5] = [
        RouteClass::Public,
        RouteClass::AuthEntry,
        RouteClass::ProfileCompletion,
        RouteClass::TwoFactorChallenge,
        RouteClass::Protected,
    ];

    fn all_states() -> Vec<SessionState> {
        let mut states = Vec::new();
        for authenticated in [false, true] {
            for two_factor_required in [false, true] {
                for two_factor_verified in [false, true] {
                    for profile_complete in [false, true] {
                        states.push(SessionState {
                            authenticated,
                            two_factor_required,
                            two_factor_verified,
                            profile_complete,
                        });
                    }
                }
            }
        }
        states
    }

    /// The rule cascade, written out rule by rule in priority order. Serves
    /// as an independent statement of the policy for the exhaustive sweep.
    fn expected_verdict(route: RouteClass, s: SessionState) -> Verdict {
        if route == RouteClass::Protected && !s.authenticated {
            return Verdict::RedirectLogin;
        }
        if route == RouteClass::Protected && !s.profile_complete {
            return Verdict::RedirectProfileCompletion;
        }
        if route == RouteClass::ProfileCompletion && s.profile_complete {
            return Verdict::RedirectProfile;
        }
        if route == RouteClass::Protected
            && s.two_factor_required
            && !s.two_factor_verified
        {
            return Verdict::RedirectTwoFactor;
        }
        if route == RouteClass::TwoFactorChallenge
            && (!s.two_factor_required || s.two_factor_verified)
        {
            return Verdict::RedirectProfile;
        }
        if route == RouteClass::AuthEntry && s.authenticated {
            if !s.profile_complete {
                return Verdict::RedirectProfileCompletion;
            }
            if s.two_factor_required && !s.two_factor_verified {
                return Verdict::RedirectTwoFactor;
            }
            return Verdict::RedirectProfile;
        }
        Verdict::Allow
    }

    #[test]
    fn matches_rule_cascade_for_every_input() {
        for route in ALL_ROUTES {
            for state in all_states() {
                assert_eq!(
                    evaluate(route, state),
                    expected_verdict(route, state),
                    "divergence at {:?} / {:?}",
                    route,
                    state
                );
            }
        }
    }

    #[test]
    fn anonymous_protected_access_goes_to_login() {
        let verdict = evaluate(RouteClass::Protected, SessionState::anonymous());
        assert_eq!(verdict, Verdict::RedirectLogin);
    }

    #[test]
    fn incomplete_profile_gates_before_two_factor() {
        let state = SessionState {
            authenticated: true,
            two_factor_required: true,
            two_factor_verified: false,
            profile_complete: false,
        };
        assert_eq!(
            evaluate(RouteClass::Protected, state),
            Verdict::RedirectProfileCompletion
        );
    }

    #[test]
    fn unverified_two_factor_blocks_protected_routes() {
        let state = SessionState {
            authenticated: true,
            two_factor_required: true,
            two_factor_verified: false,
            profile_complete: true,
        };
        assert_eq!(
            evaluate(RouteClass::Protected, state),
            Verdict::RedirectTwoFactor
        );
        // ...but the challenge page itself stays reachable.
        assert_eq!(evaluate(RouteClass::TwoFactorChallenge, state), Verdict::Allow);
    }

    #[test]
    fn challenge_page_bounces_sessions_that_do_not_need_it() {
        let verified = SessionState {
            authenticated: true,
            two_factor_required: true,
            two_factor_verified: true,
            profile_complete: true,
        };
        assert_eq!(
            evaluate(RouteClass::TwoFactorChallenge, verified),
            Verdict::RedirectProfile
        );

        let no_two_factor = SessionState {
            authenticated: true,
            two_factor_required: false,
            two_factor_verified: false,
            profile_complete: true,
        };
        assert_eq!(
            evaluate(RouteClass::TwoFactorChallenge, no_two_factor),
            Verdict::RedirectProfile
        );
    }

    #[test]
    fn auth_entry_routes_authenticated_users_onward() {
        let fresh = SessionState {
            authenticated: true,
            two_factor_required: false,
            two_factor_verified: false,
            profile_complete: false,
        };
        assert_eq!(
            evaluate(RouteClass::AuthEntry, fresh),
            Verdict::RedirectProfileCompletion
        );

        let pending_2fa = SessionState {
            authenticated: true,
            two_factor_required: true,
            two_factor_verified: false,
            profile_complete: true,
        };
        assert_eq!(
            evaluate(RouteClass::AuthEntry, pending_2fa),
            Verdict::RedirectTwoFactor
        );

        let settled = SessionState {
            authenticated: true,
            two_factor_required: true,
            two_factor_verified: true,
            profile_complete: true,
        };
        assert_eq!(
            evaluate(RouteClass::AuthEntry, settled),
            Verdict::RedirectProfile
        );
    }

    #[test]
    fn public_routes_always_allow() {
        for state in all_states() {
            assert_eq!(evaluate(RouteClass::Public, state), Verdict::Allow);
        }
    }
}
