/// The protected-write sequence shared by local and remote overwrites:
/// snapshot the target's current content into its backup slot, then commit
/// the new content. The backup step is skipped when the target does not
/// exist yet. Best-effort only: if the commit fails after the backup was
/// written, the previous generation survives in the backup slot but the
/// primary is left stale.
pub(crate) async fn backup_then_write<E, R, B, C>(
    read_current: R,
    write_backup: B,
    commit: C,
) -> Result<(), E>
where
    R: AsyncFnOnce() -> Result<Option<Vec<u8>>, E>,
    B: AsyncFnOnce(Vec<u8>) -> Result<(), E>,
    C: AsyncFnOnce() -> Result<(), E>,
{
    if let Some(current) = read_current().await? {
        write_backup(current).await?;
    }
    commit().await
}
