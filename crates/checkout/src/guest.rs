//! Guest checkout identity capture, gated by a one-time code.
//!
//! The flow itself is a synchronous state machine; the session performs
//! the OTP service calls and feeds outcomes back in. A failed code
//! submission keeps the flow in `CodeRequested` with the error surfaced
//! inline, so the user can retry without re-requesting a code and without
//! losing any identity fields they already typed.

use std::time::{Duration, Instant};

use crate::policy;
use crate::types::{GuestIdentity, OtpContact};

/// Progress of the one-time-code login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPhase {
    /// No code requested yet.
    Idle,
    /// A code is out; waiting for the user to enter it.
    CodeRequested,
    /// The code matched; the session is authenticated.
    Verified,
}

/// Guest identity fields plus the one-time-code state machine.
#[derive(Debug, Clone)]
pub struct GuestFlow {
    phase: OtpPhase,
    identity: GuestIdentity,
    contact: Option<OtpContact>,
    resend_available_at: Option<Instant>,
    inline_error: Option<String>,
}

impl Default for GuestFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestFlow {
    /// A fresh, idle flow.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: OtpPhase::Idle,
            identity: GuestIdentity {
                name: String::new(),
                surname: String::new(),
                phone: String::new(),
                email: String::new(),
                saved_addresses: Vec::new(),
            },
            contact: None,
            resend_available_at: None,
            inline_error: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> OtpPhase {
        self.phase
    }

    /// The identity fields as typed so far.
    #[must_use]
    pub const fn identity(&self) -> &GuestIdentity {
        &self.identity
    }

    /// Mutable access for in-progress field edits.
    pub const fn identity_mut(&mut self) -> &mut GuestIdentity {
        &mut self.identity
    }

    /// Where the last code was sent.
    #[must_use]
    pub const fn contact(&self) -> Option<&OtpContact> {
        self.contact.as_ref()
    }

    /// The inline error from the last failed submission, if any.
    #[must_use]
    pub fn inline_error(&self) -> Option<&str> {
        self.inline_error.as_deref()
    }

    /// Whether a (re)send is allowed at `now`.
    #[must_use]
    pub fn can_request_code(&self, now: Instant) -> bool {
        if self.phase == OtpPhase::Verified {
            return false;
        }
        self.resend_available_at.is_none_or(|at| now >= at)
    }

    /// Record that a code was sent, starting the resend cooldown.
    ///
    /// A `cooldown_seconds` of 0 from the service falls back to
    /// [`policy::OTP_FALLBACK_COOLDOWN`].
    pub fn code_requested(&mut self, contact: OtpContact, cooldown_seconds: u64, now: Instant) {
        let cooldown = if cooldown_seconds == 0 {
            policy::OTP_FALLBACK_COOLDOWN
        } else {
            Duration::from_secs(cooldown_seconds)
        };
        self.contact = Some(contact);
        self.resend_available_at = Some(now + cooldown);
        self.inline_error = None;
        self.phase = OtpPhase::CodeRequested;
    }

    /// Whether `code` has the shape of a one-time code (exactly
    /// [`policy::OTP_CODE_LENGTH`] ASCII digits), used for auto-submit.
    #[must_use]
    pub fn is_submittable_code(code: &str) -> bool {
        code.len() == policy::OTP_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
    }

    /// Record a successful verification.
    pub fn verified(&mut self) {
        self.phase = OtpPhase::Verified;
        self.inline_error = None;
        self.resend_available_at = None;
    }

    /// Record a rejected submission. The flow stays in `CodeRequested`
    /// (retry without a new code) and identity fields are untouched.
    pub fn code_rejected(&mut self, message: impl Into<String>) {
        if self.phase == OtpPhase::CodeRequested {
            self.inline_error = Some(message.into());
        }
    }

    /// Whether the session has passed verification.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.phase == OtpPhase::Verified
    }

    /// Fill empty identity fields from the authenticated profile after
    /// verification; fields the user already typed win.
    pub fn merge_profile(&mut self, name: &str, surname: &str, phone: &str, email: &str) {
        if self.identity.name.is_empty() {
            self.identity.name = name.to_owned();
        }
        if self.identity.surname.is_empty() {
            self.identity.surname = surname.to_owned();
        }
        if self.identity.phone.is_empty() {
            self.identity.phone = phone.to_owned();
        }
        if self.identity.email.is_empty() {
            self.identity.email = email.to_owned();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marea_core::Phone;

    use super::*;

    fn contact() -> OtpContact {
        OtpContact::Phone(Phone::parse("+79215550102").unwrap())
    }

    #[test]
    fn test_initial_state() {
        let flow = GuestFlow::new();
        assert_eq!(flow.phase(), OtpPhase::Idle);
        assert!(flow.can_request_code(Instant::now()));
        assert!(flow.inline_error().is_none());
    }

    #[test]
    fn test_cooldown_gates_resend() {
        let mut flow = GuestFlow::new();
        let start = Instant::now();
        flow.code_requested(contact(), 60, start);

        assert_eq!(flow.phase(), OtpPhase::CodeRequested);
        assert!(!flow.can_request_code(start + Duration::from_secs(59)));
        assert!(flow.can_request_code(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_cooldown_falls_back_to_policy() {
        let mut flow = GuestFlow::new();
        let start = Instant::now();
        flow.code_requested(contact(), 0, start);
        assert!(!flow.can_request_code(start));
        assert!(flow.can_request_code(start + policy::OTP_FALLBACK_COOLDOWN));
    }

    #[test]
    fn test_rejection_keeps_state_and_fields() {
        let mut flow = GuestFlow::new();
        flow.identity_mut().name = "Анна".to_owned();
        flow.code_requested(contact(), 60, Instant::now());

        flow.code_rejected("the code does not match");

        assert_eq!(flow.phase(), OtpPhase::CodeRequested);
        assert_eq!(flow.inline_error(), Some("the code does not match"));
        assert_eq!(flow.identity().name, "Анна");
    }

    #[test]
    fn test_verification_clears_error_and_cooldown() {
        let mut flow = GuestFlow::new();
        let start = Instant::now();
        flow.code_requested(contact(), 60, start);
        flow.code_rejected("the code does not match");

        flow.verified();

        assert!(flow.is_verified());
        assert!(flow.inline_error().is_none());
        // No more codes once verified
        assert!(!flow.can_request_code(start + Duration::from_secs(120)));
    }

    #[test]
    fn test_code_format() {
        assert!(GuestFlow::is_submittable_code("042137"));
        assert!(!GuestFlow::is_submittable_code("04213"));
        assert!(!GuestFlow::is_submittable_code("0421375"));
        assert!(!GuestFlow::is_submittable_code("04213a"));
        assert!(!GuestFlow::is_submittable_code(""));
    }

    #[test]
    fn test_merge_profile_prefers_typed_fields() {
        let mut flow = GuestFlow::new();
        flow.identity_mut().name = "Анна".to_owned();

        flow.merge_profile("Anna", "Petrova", "+79215550102", "anna@example.com");

        assert_eq!(flow.identity().name, "Анна");
        assert_eq!(flow.identity().surname, "Petrova");
        assert_eq!(flow.identity().email, "anna@example.com");
    }
}
