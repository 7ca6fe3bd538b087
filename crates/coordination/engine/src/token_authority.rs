//! Token authority: issues and resolves participant magic tokens
//!
//! A token is 32 bytes from the OS random source, hex-encoded. It carries
//! no structure: it is only a lookup key. The authority never keeps the
//! token itself, only its BLAKE3 digest, and compares digests with the
//! constant-time equality of [`blake3::Hash`].
//!
//! Each participant has at most one live token. Issuing again for the same
//! participant (rotation) replaces the old token in a single step.

use coordination_types::{
    CoordinationError, CoordinationResult, MagicToken, ParticipantId, ResolvedParticipant,
    RoleName, RunId,
};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;

/// Random bytes per token
const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded token
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

#[derive(Debug)]
struct TokenRecord {
    digest: blake3::Hash,
    holder: ResolvedParticipant,
}

#[derive(Debug, Default)]
struct TokenIndex {
    by_digest: HashMap<[u8; 32], TokenRecord>,
    by_participant: HashMap<ParticipantId, [u8; 32]>,
}

/// Issues, resolves, rotates and revokes magic tokens
#[derive(Debug, Default)]
pub struct TokenAuthority {
    index: RwLock<TokenIndex>,
}

impl TokenAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token binding `participant` to `run_id` and `role`.
    ///
    /// Any token the participant already holds stops resolving.
    pub fn issue(
        &self,
        run_id: &RunId,
        participant: &ParticipantId,
        role: &RoleName,
    ) -> MagicToken {
        let (token, digest) = generate();
        let holder = ResolvedParticipant {
            run_id: run_id.clone(),
            participant_id: participant.clone(),
            role: role.clone(),
        };

        let mut index = self.index.write();
        if let Some(old) = index.by_participant.insert(participant.clone(), *digest.as_bytes()) {
            index.by_digest.remove(&old);
        }
        index
            .by_digest
            .insert(*digest.as_bytes(), TokenRecord { digest, holder });

        tracing::debug!(run_id = %run_id, participant = %participant, "Token issued");
        token
    }

    /// Resolve a token to the participant it was issued to.
    ///
    /// Unknown, malformed, revoked and rotated-away tokens all fail the same
    /// way so callers learn nothing about why.
    pub fn resolve(&self, token: &str) -> CoordinationResult<ResolvedParticipant> {
        if !is_well_formed(token) {
            return Err(CoordinationError::InvalidToken);
        }
        let digest = blake3::hash(token.as_bytes());

        let index = self.index.read();
        match index.by_digest.get(digest.as_bytes()) {
            Some(record) if record.digest == digest => Ok(record.holder.clone()),
            _ => Err(CoordinationError::InvalidToken),
        }
    }

    /// Replace a participant's live token, returning the new one
    pub fn rotate(&self, participant: &ParticipantId) -> CoordinationResult<MagicToken> {
        let (token, digest) = generate();

        let mut index = self.index.write();
        let old = index
            .by_participant
            .get(participant)
            .copied()
            .ok_or_else(|| CoordinationError::ParticipantNotFound(participant.clone()))?;
        let record = index
            .by_digest
            .remove(&old)
            .ok_or_else(|| CoordinationError::ParticipantNotFound(participant.clone()))?;

        index
            .by_participant
            .insert(participant.clone(), *digest.as_bytes());
        index.by_digest.insert(
            *digest.as_bytes(),
            TokenRecord {
                digest,
                holder: record.holder,
            },
        );

        tracing::info!(participant = %participant, "Token rotated");
        Ok(token)
    }

    /// Invalidate a participant's token. Returns whether one was live.
    pub fn revoke(&self, participant: &ParticipantId) -> bool {
        let mut index = self.index.write();
        match index.by_participant.remove(participant) {
            Some(digest) => {
                index.by_digest.remove(&digest);
                tracing::info!(participant = %participant, "Token revoked");
                true
            }
            None => false,
        }
    }

    /// Whether the participant currently holds a live token
    pub fn has_live_token(&self, participant: &ParticipantId) -> bool {
        self.index.read().by_participant.contains_key(participant)
    }

    /// Number of live tokens
    pub fn live_count(&self) -> usize {
        self.index.read().by_digest.len()
    }
}

fn generate() -> (MagicToken, blake3::Hash) {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let digest = blake3::hash(token.as_bytes());
    (MagicToken::new(token), digest)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
