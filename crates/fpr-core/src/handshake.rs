//! The four-message security handshake (§5.C).
//!
//! Grounded on the teacher's `Connection<I>` action-pattern state machine:
//! each handshake-driving method takes the inputs available at that step and
//! returns `Vec<HandshakeAction>` for the caller (the receive pipeline, in
//! `fpr-router`) to execute — building and sending the actual packet,
//! bumping statistics, logging — rather than performing any I/O itself.
//!
//! The duplicate/out-of-order policy is intentionally asymmetric (see the
//! spec's §5.C design note) and is pinned exactly by the property tests in
//! `fpr-harness` (P4-P6).

use fpr_crypto::Key128;
use fpr_proto::MacAddr;

use crate::peer::{ConnectionState, PeerRecord, SecurityState};

/// Outcome of feeding a handshake step to a peer's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send a control packet carrying the given key material to `dest`.
    SendStep {
        /// Destination of the control packet.
        dest: MacAddr,
        /// PWK to attach, if any.
        pwk: Option<Key128>,
        /// LWK to attach, if any.
        lwk: Option<Key128>,
    },
    /// The handshake just completed on this side.
    Established,
    /// The host appears to have restarted; the peer's state was reset to
    /// `None` before reprocessing this step as a fresh step 1.
    Restarted,
    /// Key verification failed. Counted by the caller; state unchanged.
    SecurityFailure,
    /// The frame was silently dropped (duplicate, retransmit, or
    /// out-of-order ack). Not a failure — just nothing to do.
    Dropped {
        /// Why the frame was dropped, for logging.
        reason: &'static str,
    },
}

fn is_at_least_lwk_sent(state: SecurityState) -> bool {
    matches!(state, SecurityState::LwkSent | SecurityState::LwkReceived | SecurityState::Established)
}

impl<I: Copy> PeerRecord<I> {
    /// Host: initiates the handshake by sending step 1 (PWK) to a newly
    /// discovered or pending client.
    ///
    /// Only valid from `SecurityState::None`; the caller is expected to have
    /// already checked the peer isn't mid-handshake.
    pub fn host_send_step1(&mut self, dest: MacAddr, host_pwk: Key128) -> Vec<HandshakeAction> {
        if self.sec_state() != SecurityState::None {
            return vec![HandshakeAction::Dropped { reason: "handshake already in progress" }];
        }
        self.set_pwk(host_pwk, true);
        self.set_sec_state(SecurityState::PwkSent);
        vec![HandshakeAction::SendStep { dest, pwk: Some(host_pwk), lwk: None }]
    }

    /// Host: processes step 2 (client's PWK echo + LWK) and, if valid,
    /// replies with step 3 and marks the peer `Connected`.
    pub fn host_handle_step2(
        &mut self,
        dest: MacAddr,
        host_pwk: Key128,
        echoed_pwk: Key128,
        client_lwk: Key128,
    ) -> Vec<HandshakeAction> {
        match self.sec_state() {
            SecurityState::PwkSent => {
                if echoed_pwk != host_pwk {
                    return vec![HandshakeAction::SecurityFailure];
                }
                self.set_lwk(client_lwk, true);
                self.set_sec_state(SecurityState::Established);
                self.set_state(ConnectionState::Connected);
                self.reset_sequence();
                vec![
                    HandshakeAction::SendStep {
                        dest,
                        pwk: Some(host_pwk),
                        lwk: Some(client_lwk),
                    },
                    HandshakeAction::Established,
                ]
            },
            SecurityState::Established => {
                // Retransmit of step 2 after we already completed: re-ack.
                vec![HandshakeAction::SendStep {
                    dest,
                    pwk: Some(host_pwk),
                    lwk: self.lwk(),
                }]
            },
            _ => vec![HandshakeAction::Dropped { reason: "step 2 out of order" }],
        }
    }

    /// Client: processes step 1 (host's PWK).
    pub fn client_handle_step1(&mut self, host_pwk: Key128) -> Vec<HandshakeAction> {
        match self.sec_state() {
            SecurityState::None => {
                self.set_pwk(host_pwk, true);
                self.set_sec_state(SecurityState::PwkReceived);
                vec![]
            },
            SecurityState::PwkReceived => {
                vec![HandshakeAction::Dropped { reason: "duplicate pwk" }]
            },
            state if is_at_least_lwk_sent(state) => {
                self.wipe_keys();
                self.set_pwk(host_pwk, true);
                self.set_sec_state(SecurityState::PwkReceived);
                vec![HandshakeAction::Restarted]
            },
            _ => vec![HandshakeAction::Dropped { reason: "unexpected pwk" }],
        }
    }

    /// Client: generates its LWK and sends step 2 (PWK echo + LWK).
    ///
    /// Only valid from `SecurityState::PwkReceived` (i.e. after
    /// [`PeerRecord::client_handle_step1`]).
    pub fn client_send_step2(
        &mut self,
        dest: MacAddr,
        generate_lwk: impl FnOnce() -> Key128,
    ) -> Vec<HandshakeAction> {
        if self.sec_state() != SecurityState::PwkReceived {
            return vec![HandshakeAction::Dropped { reason: "no pwk to echo" }];
        }
        #[allow(clippy::expect_used)]
        let host_pwk = self.pwk().expect("invariant: PwkReceived implies a stored pwk");
        let lwk = generate_lwk();
        self.set_lwk(lwk, true);
        self.set_sec_state(SecurityState::LwkSent);
        vec![HandshakeAction::SendStep { dest, pwk: Some(host_pwk), lwk: Some(lwk) }]
    }

    /// Client: processes step 3 (host's PWK+LWK echo), completing the
    /// handshake if both keys verify.
    pub fn client_handle_step3(&mut self, echoed_pwk: Key128, echoed_lwk: Key128) -> Vec<HandshakeAction> {
        match self.sec_state() {
            SecurityState::LwkSent => {
                let pwk_ok = self.pwk() == Some(echoed_pwk);
                let lwk_ok = self.lwk() == Some(echoed_lwk);
                if !pwk_ok || !lwk_ok {
                    return vec![HandshakeAction::SecurityFailure];
                }
                self.set_sec_state(SecurityState::Established);
                self.set_state(ConnectionState::Connected);
                self.reset_sequence();
                vec![HandshakeAction::Established]
            },
            SecurityState::Established => {
                vec![HandshakeAction::Dropped { reason: "ack retransmit" }]
            },
            _ => vec![HandshakeAction::Dropped { reason: "ack out of order" }],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, n])
    }

    #[test]
    fn full_handshake_establishes_both_sides() {
        let host_pwk = Key128::from_bytes([1; 16]);
        let client_lwk = Key128::from_bytes([2; 16]);

        let mut host_side: PeerRecord<Instant> = PeerRecord::new("client", Instant::now());
        let mut client_side: PeerRecord<Instant> = PeerRecord::new("host", Instant::now());

        let step1 = host_side.host_send_step1(mac(2), host_pwk);
        assert_eq!(host_side.sec_state(), SecurityState::PwkSent);
        let HandshakeAction::SendStep { pwk: Some(sent_pwk), lwk: None, .. } = step1[0] else {
            panic!("expected step 1 SendStep");
        };

        client_side.client_handle_step1(sent_pwk);
        assert_eq!(client_side.sec_state(), SecurityState::PwkReceived);

        let step2 = client_side.client_send_step2(mac(1), || client_lwk);
        assert_eq!(client_side.sec_state(), SecurityState::LwkSent);
        let HandshakeAction::SendStep { pwk: Some(echoed_pwk), lwk: Some(sent_lwk), .. } = step2[0]
        else {
            panic!("expected step 2 SendStep");
        };

        let step3 = host_side.host_handle_step2(mac(2), host_pwk, echoed_pwk, sent_lwk);
        assert!(step3.contains(&HandshakeAction::Established));
        assert_eq!(host_side.sec_state(), SecurityState::Established);
        assert_eq!(host_side.state(), ConnectionState::Connected);

        let HandshakeAction::SendStep { pwk: Some(ack_pwk), lwk: Some(ack_lwk), .. } = step3[0]
        else {
            panic!("expected step 3 SendStep");
        };

        let established = client_side.client_handle_step3(ack_pwk, ack_lwk);
        assert_eq!(established, vec![HandshakeAction::Established]);
        assert_eq!(client_side.sec_state(), SecurityState::Established);
        assert_eq!(client_side.state(), ConnectionState::Connected);
        assert!(client_side.pwk_valid() && client_side.lwk_valid());
        assert!(host_side.pwk_valid() && host_side.lwk_valid());
    }

    #[test]
    fn duplicate_step1_before_step2_is_ignored() {
        let pwk = Key128::from_bytes([1; 16]);
        let mut client: PeerRecord<Instant> = PeerRecord::new("host", Instant::now());
        client.client_handle_step1(pwk);
        let actions = client.client_handle_step1(pwk);
        assert_eq!(actions, vec![HandshakeAction::Dropped { reason: "duplicate pwk" }]);
        assert_eq!(client.sec_state(), SecurityState::PwkReceived);
    }

    #[test]
    fn repeated_step3_leaves_established_state() {
        let pwk = Key128::from_bytes([1; 16]);
        let lwk = Key128::from_bytes([2; 16]);
        let mut client: PeerRecord<Instant> = PeerRecord::new("host", Instant::now());
        client.client_handle_step1(pwk);
        client.client_send_step2(mac(1), || lwk);
        client.client_handle_step3(pwk, lwk);
        let second = client.client_handle_step3(pwk, lwk);
        assert_eq!(second, vec![HandshakeAction::Dropped { reason: "ack retransmit" }]);
        assert_eq!(client.sec_state(), SecurityState::Established);
    }

    #[test]
    fn host_restart_resets_client_to_none_then_receives() {
        let pwk1 = Key128::from_bytes([1; 16]);
        let lwk = Key128::from_bytes([2; 16]);
        let pwk2 = Key128::from_bytes([9; 16]);

        let mut client: PeerRecord<Instant> = PeerRecord::new("host", Instant::now());
        client.client_handle_step1(pwk1);
        client.client_send_step2(mac(1), || lwk);
        client.client_handle_step3(pwk1, lwk);
        assert_eq!(client.sec_state(), SecurityState::Established);

        let actions = client.client_handle_step1(pwk2);
        assert_eq!(actions, vec![HandshakeAction::Restarted]);
        assert_eq!(client.sec_state(), SecurityState::PwkReceived);
        assert_eq!(client.pwk(), Some(pwk2));
    }

    #[test]
    fn mismatched_lwk_fails_verification_without_state_change() {
        let pwk = Key128::from_bytes([1; 16]);
        let real_lwk = Key128::from_bytes([2; 16]);
        let wrong_lwk = Key128::from_bytes([3; 16]);

        let mut client: PeerRecord<Instant> = PeerRecord::new("host", Instant::now());
        client.client_handle_step1(pwk);
        client.client_send_step2(mac(1), || real_lwk);

        let actions = client.client_handle_step3(pwk, wrong_lwk);
        assert_eq!(actions, vec![HandshakeAction::SecurityFailure]);
        assert_eq!(client.sec_state(), SecurityState::LwkSent);
        assert_ne!(client.state(), ConnectionState::Connected);
    }
}
