//! Transform chain execution.
//!
//! A chain is applied in declared order on encode and undone in exactly the
//! reverse order on decode. The engine holds no state between calls.

use tracing::debug;
use xfdu_core::{KeyDerivationSpec, Transform, TransformKind};

use crate::error::{CodecError, Result};
use crate::registry::CodecRegistry;

/// The chain in application order.
///
/// If every transform carries an integer `order` hint the chain is sorted by
/// it; if none does, document order stands. Anything in between is
/// ambiguous.
pub fn ordered_chain(chain: &[Transform]) -> Result<Vec<&Transform>> {
    let hinted = chain.iter().filter(|t| t.order_hint().is_some()).count();
    if hinted == 0 {
        return Ok(chain.iter().collect());
    }
    if hinted != chain.len() {
        return Err(CodecError::AmbiguousOrder {
            reason: format!("{hinted} of {} transforms declare an order", chain.len()),
        });
    }

    let mut keyed = chain
        .iter()
        .map(|t| {
            let hint = t.order_hint().unwrap_or_default();
            hint.parse::<i64>()
                .map(|k| (k, t))
                .map_err(|_| CodecError::AmbiguousOrder {
                    reason: format!("order '{hint}' of {} is not an integer", t.label()),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by_key(|(k, _)| *k);
    if let Some(pair) = keyed.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(CodecError::AmbiguousOrder {
            reason: format!("order {} is declared twice", pair[0].0),
        });
    }
    Ok(keyed.into_iter().map(|(_, t)| t).collect())
}

/// Apply a chain in forward order.
pub fn encode(data: &[u8], chain: &[Transform], registry: &CodecRegistry) -> Result<Vec<u8>> {
    let mut bytes = data.to_vec();
    for transform in ordered_chain(chain)? {
        debug!(algorithm = %transform.algorithm, kind = %transform.kind, len = bytes.len(), "encode step");
        bytes = step(&bytes, transform, registry, Direction::Encode)?;
    }
    Ok(bytes)
}

/// Undo a chain, last-applied transform first.
pub fn decode(data: &[u8], chain: &[Transform], registry: &CodecRegistry) -> Result<Vec<u8>> {
    let mut bytes = data.to_vec();
    for transform in ordered_chain(chain)?.into_iter().rev() {
        debug!(algorithm = %transform.algorithm, kind = %transform.kind, len = bytes.len(), "decode step");
        bytes = step(&bytes, transform, registry, Direction::Decode)?;
    }
    Ok(bytes)
}

#[derive(Clone, Copy)]
enum Direction {
    Encode,
    Decode,
}

fn step(
    data: &[u8],
    transform: &Transform,
    registry: &CodecRegistry,
    direction: Direction,
) -> Result<Vec<u8>> {
    let name = transform.algorithm.as_str();
    match transform.kind {
        TransformKind::Compression | TransformKind::Encryption => {
            let codec = match transform.kind {
                TransformKind::Compression => registry.compression(name)?,
                _ => registry.encryption(name)?,
            };
            let key = if codec.needs_key() {
                Some(working_key(transform, registry)?)
            } else {
                None
            };
            match direction {
                Direction::Encode => codec.encode(data, key.as_deref()),
                Direction::Decode => codec.decode(data, key.as_deref()),
            }
        }
        TransformKind::Authentication => {
            let auth = registry.authenticator(name)?;
            let key = working_key(transform, registry)?;
            match direction {
                Direction::Encode => {
                    let mut out = data.to_vec();
                    out.extend_from_slice(&auth.tag(data, &key)?);
                    Ok(out)
                }
                Direction::Decode => {
                    let failed = || CodecError::AuthenticationFailed {
                        algorithm: name.to_string(),
                    };
                    let split = data.len().checked_sub(auth.tag_len()).ok_or_else(failed)?;
                    let (content, tag) = data.split_at(split);
                    if auth.verify(content, tag, &key)? {
                        Ok(content.to_vec())
                    } else {
                        Err(failed())
                    }
                }
            }
        }
    }
}

/// Fold the registry secret through every declared derivation, in order.
fn working_key(transform: &Transform, registry: &CodecRegistry) -> Result<Vec<u8>> {
    let secret = registry.secret().ok_or_else(|| CodecError::KeyRequired {
        algorithm: transform.algorithm.clone(),
    })?;
    transform
        .key_derivations
        .iter()
        .map(KeyDerivationSpec::params)
        .try_fold(secret.to_vec(), |key, kd| {
            registry
                .key_derivation(&kd.name)?
                .derive(&key, kd.salt.as_bytes(), kd.iteration_count)
        })
}
