//! Byte stream combinator: rebuilds a data object's canonical bytes.
//!
//! Per data object:
//!
//! 1. fetch every byte stream and verify its checksum (concurrently, bounded
//!    by a semaphore)
//! 2. undo each stream's own transform chain
//! 3. concatenate in document order
//! 4. undo the data object's transform chain
//!
//! The first failure aborts the remaining fetches; nothing partial is
//! returned.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use xfdu_codec::CodecRegistry;
use xfdu_core::{ByteStream, CombinationMethod, DataObject};
use xfdu_store::ByteSource;

use crate::error::MaterializationError;

type Result<T> = std::result::Result<T, MaterializationError>;

/// Knobs the combinator takes from the archive configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombineOptions {
    /// Fail instead of warning when a declared size is wrong.
    pub strict_size: bool,
    /// Fetches in flight per data object.
    pub max_concurrent_fetches: usize,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            strict_size: false,
            max_concurrent_fetches: 8,
        }
    }
}

/// Materializes data objects from one byte source.
pub struct Combinator<S> {
    source: Arc<S>,
    registry: Arc<CodecRegistry>,
    options: CombineOptions,
}

impl<S: ByteSource + 'static> Combinator<S> {
    pub fn new(source: Arc<S>, registry: Arc<CodecRegistry>, options: CombineOptions) -> Self {
        Self {
            source,
            registry,
            options,
        }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Reconstruct the canonical bytes of a data object.
    pub async fn materialize(&self, object: &DataObject) -> Result<Bytes> {
        let data_object = object.id.as_str();

        // 1. Combination method
        let streams = object.byte_streams.len();
        if streams > 1 {
            match object.combination {
                Some(CombinationMethod::Concat) => {}
                None => {
                    return Err(MaterializationError::UnsupportedCombination {
                        data_object: data_object.to_string(),
                        streams,
                    })
                }
            }
        }

        // 2. Fetch and verify
        let stored = self.fetch_all(object).await?;

        // 3. Undo stream chains and concatenate
        let mut combined = BytesMut::new();
        for (stream, bytes) in object.byte_streams.iter().zip(stored) {
            if stream.transforms.is_empty() {
                combined.extend_from_slice(&bytes);
            } else {
                let plain = xfdu_codec::decode(&bytes, &stream.transforms, &self.registry)
                    .map_err(|source| MaterializationError::Transform {
                        subject: format!(
                            "byte stream '{}' of data object '{data_object}'",
                            stream.label()
                        ),
                        source,
                    })?;
                combined.extend_from_slice(&plain);
            }
        }

        if let Some(declared) = object.size {
            check_size(
                || format!("data object '{data_object}'"),
                declared,
                combined.len() as u64,
                self.options.strict_size,
            )?;
        }

        // 4. Undo the data object chain
        let bytes = if object.transforms.is_empty() {
            combined.freeze()
        } else {
            xfdu_codec::decode(&combined, &object.transforms, &self.registry)
                .map(Bytes::from)
                .map_err(|source| MaterializationError::Transform {
                    subject: format!("data object '{data_object}'"),
                    source,
                })?
        };

        debug!(data_object, streams, len = bytes.len(), "materialized");
        Ok(bytes)
    }

    /// Fetch every stream concurrently, returning the stored bytes in
    /// document order.
    async fn fetch_all(&self, object: &DataObject) -> Result<Vec<Bytes>> {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_fetches.max(1)));
        let mut tasks = JoinSet::new();

        for (index, stream) in object.byte_streams.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let registry = Arc::clone(&self.registry);
            let permits = Arc::clone(&permits);
            let stream = stream.clone();
            let data_object = object.id.to_string();
            let strict_size = self.options.strict_size;

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| MaterializationError::Cancelled {
                        data_object: data_object.clone(),
                    })?;
                fetch_verified(&*source, &registry, &data_object, &stream, strict_size)
                    .await
                    .map(|bytes| (index, bytes))
            });
        }

        let mut slots: Vec<Option<Bytes>> = vec![None; object.byte_streams.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, bytes))) => slots[index] = Some(bytes),
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {
                    tasks.abort_all();
                    return Err(MaterializationError::Cancelled {
                        data_object: object.id.to_string(),
                    });
                }
            }
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| MaterializationError::Cancelled {
                data_object: object.id.to_string(),
            })
    }
}

/// Fetch one stream and check it against its declared checksum and size.
async fn fetch_verified<S: ByteSource + ?Sized>(
    source: &S,
    registry: &CodecRegistry,
    data_object: &str,
    stream: &ByteStream,
    strict_size: bool,
) -> Result<Bytes> {
    let bytes = source
        .fetch(&stream.file_location)
        .await
        .map_err(|source| MaterializationError::Fetch {
            data_object: data_object.to_string(),
            stream: stream.label(),
            source,
        })?;

    let algorithm = &stream.checksum.algorithm;
    let actual = registry
        .compute_checksum(algorithm, &bytes)
        .map_err(|source| MaterializationError::Transform {
            subject: format!("checksum of byte stream '{}'", stream.label()),
            source,
        })?;
    if !stream.checksum.matches(&actual) {
        warn!(
            data_object,
            stream = %stream.label(),
            %algorithm,
            expected = %stream.checksum.value,
            %actual,
            "checksum mismatch"
        );
        return Err(MaterializationError::ChecksumMismatch {
            data_object: data_object.to_string(),
            stream: stream.label(),
            algorithm: algorithm.clone(),
            expected: stream.checksum.value.trim().to_string(),
            actual,
        });
    }

    if let Some(declared) = stream.size {
        check_size(
            || format!("byte stream '{}' of data object '{data_object}'", stream.label()),
            declared,
            bytes.len() as u64,
            strict_size,
        )?;
    }

    debug!(data_object, stream = %stream.label(), len = bytes.len(), "stream verified");
    Ok(bytes)
}

fn check_size(
    subject: impl FnOnce() -> String,
    declared: u64,
    actual: u64,
    strict: bool,
) -> Result<()> {
    if declared == actual {
        return Ok(());
    }
    let subject = subject();
    if strict {
        return Err(MaterializationError::SizeMismatch {
            subject,
            declared,
            actual,
        });
    }
    warn!(%subject, declared, actual, "declared size differs");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfdu_core::{Checksum, Id, Reference, Transform, TransformKind};
    use xfdu_store::{MemorySource, StoreError};

    fn md5(data: &[u8]) -> String {
        CodecRegistry::with_defaults().compute_checksum("MD5", data).unwrap()
    }

    fn stream(href: &str, data: &[u8]) -> ByteStream {
        ByteStream::new(
            "application/octet-stream",
            Reference::url(href),
            Checksum::new("MD5", md5(data)),
        )
    }

    fn data_object(streams: Vec<ByteStream>) -> DataObject {
        DataObject {
            id: Id::parse("dataObject", "D1").unwrap(),
            rep_ids: vec![Id::parse("dataObject", "M1").unwrap()],
            size: None,
            combination: (streams.len() > 1).then_some(CombinationMethod::Concat),
            registration_authority: None,
            registered_id: None,
            byte_streams: streams,
            transforms: Vec::new(),
        }
    }

    fn combinator(source: MemorySource, options: CombineOptions) -> Combinator<MemorySource> {
        Combinator::new(
            Arc::new(source),
            Arc::new(CodecRegistry::with_defaults().with_secret("secret")),
            options,
        )
    }

    fn ab_cd_source() -> MemorySource {
        MemorySource::new()
            .with("B1.dat", "AB")
            .unwrap()
            .with("B2.dat", "CD")
            .unwrap()
    }

    #[tokio::test]
    async fn test_concat_in_document_order() {
        let object = data_object(vec![stream("./B1.dat", b"AB"), stream("./B2.dat", b"CD")]);
        let bytes = combinator(ab_cd_source(), CombineOptions::default())
            .materialize(&object)
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("ABCD"));
    }

    #[tokio::test]
    async fn test_order_holds_with_single_permit() {
        let object = data_object(vec![stream("./B2.dat", b"CD"), stream("./B1.dat", b"AB")]);
        let options = CombineOptions {
            max_concurrent_fetches: 1,
            ..CombineOptions::default()
        };
        let bytes = combinator(ab_cd_source(), options)
            .materialize(&object)
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("CDAB"));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_yields_no_bytes() {
        let mut tampered = stream("./B2.dat", b"CD");
        tampered.checksum.value = md5(b"XX");
        let object = data_object(vec![stream("./B1.dat", b"AB"), tampered]);

        let err = combinator(ab_cd_source(), CombineOptions::default())
            .materialize(&object)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MaterializationError::ChecksumMismatch { ref stream, .. } if stream == "./B2.dat"
        ));
    }

    #[tokio::test]
    async fn test_multiple_streams_need_combination() {
        let mut object = data_object(vec![stream("./B1.dat", b"AB"), stream("./B2.dat", b"CD")]);
        object.combination = None;
        let err = combinator(ab_cd_source(), CombineOptions::default())
            .materialize(&object)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MaterializationError::UnsupportedCombination { streams: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_stream_is_fetch_error() {
        let object = data_object(vec![stream("./B1.dat", b"AB"), stream("./B9.dat", b"??")]);
        let err = combinator(ab_cd_source(), CombineOptions::default())
            .materialize(&object)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MaterializationError::Fetch {
                source: StoreError::NotFound { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_size_mismatch_warns_unless_strict() {
        let mut object = data_object(vec![stream("./B1.dat", b"AB")]);
        object.size = Some(3);

        let lenient = combinator(ab_cd_source(), CombineOptions::default());
        assert_eq!(lenient.materialize(&object).await.unwrap(), Bytes::from("AB"));

        let strict = combinator(
            ab_cd_source(),
            CombineOptions {
                strict_size: true,
                ..CombineOptions::default()
            },
        );
        assert!(matches!(
            strict.materialize(&object).await,
            Err(MaterializationError::SizeMismatch {
                declared: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_stream_then_object_chains_are_undone() {
        let registry = CodecRegistry::with_defaults().with_secret("secret");
        let object_chain = vec![Transform::new(TransformKind::Compression, "gzip")];
        let stream_chain = vec![Transform::new(TransformKind::Encryption, "chacha20poly1305")];

        // producer side: object chain over the whole, then split, then stream chain
        let whole = xfdu_codec::encode(b"measurement payload", &object_chain, &registry).unwrap();
        let (head, tail) = whole.split_at(whole.len() / 2);
        let stored_head = xfdu_codec::encode(head, &stream_chain, &registry).unwrap();

        let source = MemorySource::new()
            .with("head.dat", stored_head.clone())
            .unwrap()
            .with("tail.dat", tail.to_vec())
            .unwrap();

        let mut first = stream("head.dat", &stored_head);
        first.transforms = stream_chain;
        let mut object = data_object(vec![first, stream("tail.dat", tail)]);
        object.transforms = object_chain;

        let bytes = combinator(source, CombineOptions::default())
            .materialize(&object)
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("measurement payload"));
    }

    #[tokio::test]
    async fn test_failed_chain_names_the_stream() {
        let mut bad = stream("./B1.dat", b"AB");
        bad.transforms = vec![Transform::new(TransformKind::Compression, "zlib")];
        let object = data_object(vec![bad]);
        let err = combinator(ab_cd_source(), CombineOptions::default())
            .materialize(&object)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MaterializationError::Transform { ref subject, .. } if subject.contains("./B1.dat")
        ));
    }
}
