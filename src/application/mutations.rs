//! Static write operations.
//!
//! Each write computes the document's next local shape, makes it visible in
//! the cache (single-document entry first, then every registered list), and
//! only then forwards the write to the remote store. A reader observing the
//! cache right after the call returns always sees the optimistic state.
//!
//! If the remote write later fails, the optimistic state is NOT rolled back;
//! the error propagates to the caller, who owns reconciliation.

use crate::cache::ChangeOrigin;
use crate::domain::field_value::UpdateMap;
use crate::domain::path::DocumentPath;

use super::error::Error;
use super::mirror::Mirror;
use super::options::{MutateOptions, SetOptions};
use super::remote::WritePolicy;

fn write_policy(options: &SetOptions) -> WritePolicy {
    match options {
        SetOptions::Replace => WritePolicy::Replace,
        SetOptions::Merge => WritePolicy::Merge,
        SetOptions::MergeFields(fields) => WritePolicy::MergeFields(fields.clone()),
    }
}

impl Mirror {
    /// Write a document, replacing or merging per `options`.
    pub async fn set_doc(
        &self,
        path: &str,
        data: UpdateMap,
        options: &SetOptions,
        mutate: &MutateOptions,
    ) -> Result<(), Error> {
        let path = DocumentPath::parse(path)?;
        let policy = write_policy(options);
        if !mutate.ignore_local_mutation {
            self.apply_local_write(&path, &data, &policy, ChangeOrigin::OptimisticWrite);
        }
        self.store().write(&path, data, policy).await?;
        Ok(())
    }

    /// Patch an existing document. Field paths in `data` may use dot
    /// notation. Fails with `RemoteError::NotFound` if the remote document
    /// does not exist.
    pub async fn update_doc(
        &self,
        path: &str,
        data: UpdateMap,
        mutate: &MutateOptions,
    ) -> Result<(), Error> {
        let path = DocumentPath::parse(path)?;
        if !mutate.ignore_local_mutation {
            self.apply_local_write(
                &path,
                &data,
                &WritePolicy::Update,
                ChangeOrigin::OptimisticWrite,
            );
        }
        self.store().write(&path, data, WritePolicy::Update).await?;
        Ok(())
    }

    /// Delete a document.
    pub async fn delete_doc(&self, path: &str, mutate: &MutateOptions) -> Result<(), Error> {
        let path = DocumentPath::parse(path)?;
        if !mutate.ignore_local_mutation {
            self.apply_local_delete(&path, ChangeOrigin::OptimisticWrite);
        }
        self.store().delete(&path).await?;
        Ok(())
    }
}
