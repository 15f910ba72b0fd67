//! Fallback verification for platforms with several replacement domains.
//!
//! A session posts the first candidate as a reply, gives the chat platform a
//! bounded window to attach a link preview, and re-checks. No preview means
//! the candidate's mirror is down or unembeddable, so the session edits the
//! same reply to the next candidate domain. It stops on the first verified
//! preview, when candidates run out, or when the retry budget is spent. The
//! reply is never deleted; whatever was tried last stays in place.

use tokio::time::sleep;
use tracing::debug;

use crate::chat::{ChatGateway, MessageRef};
use crate::config::FallbackTuning;

/// One candidate domain with the reply text rendered for it.
#[derive(Debug, Clone)]
pub struct CandidateReply {
    pub domain: String,
    pub content: String,
}

impl CandidateReply {
    pub fn new(domain: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStatus {
    /// A preview appeared for the domain reported in the outcome.
    Succeeded,
    /// Candidates or the retry budget ran out; the last tried content stays.
    Exhausted,
}

/// Terminal result of one session.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub status: FallbackStatus,
    /// Domain of the last attempt (the verified one on success).
    pub domain: String,
    pub attempts: u32,
    /// The session's reply message, if any attempt managed to post it.
    pub reply: Option<MessageRef>,
}

/// Drives one multi-domain match to a terminal state. Created per matching
/// message and discarded afterwards; owns its reply exclusively.
pub struct FallbackSession<'a> {
    gateway: &'a dyn ChatGateway,
    origin: &'a MessageRef,
    candidates: Vec<CandidateReply>,
    tuning: FallbackTuning,
    mention: bool,
}

impl<'a> FallbackSession<'a> {
    pub fn new(
        gateway: &'a dyn ChatGateway,
        origin: &'a MessageRef,
        candidates: Vec<CandidateReply>,
        tuning: FallbackTuning,
        mention: bool,
    ) -> Self {
        Self {
            gateway,
            origin,
            candidates,
            tuning,
            mention,
        }
    }

    /// Run to a terminal state. Transport failures count as unverified
    /// attempts; they never abort the session.
    pub async fn run(self) -> FallbackOutcome {
        let total = self.candidates.len();
        let mut attempts: u32 = 0;
        let mut cursor: usize = 0;
        let mut reply: Option<MessageRef> = None;

        if total == 0 {
            return FallbackOutcome {
                status: FallbackStatus::Exhausted,
                domain: String::new(),
                attempts,
                reply,
            };
        }

        loop {
            attempts += 1;
            let candidate = &self.candidates[cursor];
            debug!(
                "fallback attempt {attempts}: candidate {}/{total} ({})",
                cursor + 1,
                candidate.domain
            );

            // First attempt posts the reply; every later attempt edits that
            // same message. A failed post leaves the handle unset so the next
            // attempt posts anew; a failed edit keeps it.
            let delivered = match reply.as_ref() {
                Some(existing) => {
                    match self.gateway.edit_message(existing, &candidate.content).await {
                        Ok(()) => true,
                        Err(err) => {
                            debug!("fallback edit failed for {}: {err}", candidate.domain);
                            false
                        }
                    }
                }
                None => {
                    match self
                        .gateway
                        .post_reply(self.origin, &candidate.content, self.mention)
                        .await
                    {
                        Ok(created) => {
                            reply = Some(created);
                            true
                        }
                        Err(err) => {
                            debug!("fallback post failed for {}: {err}", candidate.domain);
                            false
                        }
                    }
                }
            };

            let verified = match reply.as_ref() {
                Some(message) if delivered => self.observe(message).await,
                _ => false,
            };

            if verified {
                debug!("fallback verified preview for {}", candidate.domain);
                return FallbackOutcome {
                    status: FallbackStatus::Succeeded,
                    domain: candidate.domain.clone(),
                    attempts,
                    reply,
                };
            }

            if attempts >= self.tuning.max_retries || cursor + 1 >= total {
                return FallbackOutcome {
                    status: FallbackStatus::Exhausted,
                    domain: candidate.domain.clone(),
                    attempts,
                    reply,
                };
            }
            cursor += 1;
        }
    }

    /// Two-phase preview observation: wait, check, and if nothing appeared
    /// wait once more and re-check. Check failures read as "no preview".
    async fn observe(&self, message: &MessageRef) -> bool {
        sleep(self.tuning.first_wait()).await;
        match self.gateway.has_preview(message).await {
            Ok(true) => true,
            Ok(false) => {
                sleep(self.tuning.second_wait()).await;
                match self.gateway.has_preview(message).await {
                    Ok(found) => found,
                    Err(err) => {
                        debug!("preview re-check failed: {err}");
                        false
                    }
                }
            }
            Err(err) => {
                debug!("preview check failed: {err}");
                false
            }
        }
    }
}
