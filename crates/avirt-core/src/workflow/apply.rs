use super::{event, WorkflowLevel, WorkflowReport};
use crate::configfs::Mounter;
use crate::error::{AvirtError, AvirtResult};
use crate::session::AvirtSession;
use avirt_provider::ControlProvider;

/// Knobs for [`apply`].
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Seal the card once every stream has been created.
    pub seal: bool,
    /// Treat streams that already exist in configfs as done instead of failing.
    pub skip_existing: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            seal: true,
            skip_existing: false,
        }
    }
}

/// Create every configured stream in order, then seal the card.
///
/// A card that is already sealed aborts with `Sealed` before anything is
/// created. Otherwise stops at the first failure and returns it; streams
/// created before the failure stay in configfs.
pub fn apply<C, M>(
    session: &mut AvirtSession<C, M>,
    options: ApplyOptions,
) -> AvirtResult<WorkflowReport>
where
    C: ControlProvider<Error = AvirtError>,
    M: Mounter,
{
    session.ensure_mounted()?;
    if session.refresh_sealed()? {
        return Err(AvirtError::Sealed);
    }

    let mut events = Vec::new();
    let streams = session.config().streams.clone();

    if streams.is_empty() {
        events.push(event(
            WorkflowLevel::Warn,
            "No streams configured; the card will expose no PCM devices.",
        ));
    }

    for spec in &streams {
        match session.create_stream(spec) {
            Ok(path) => events.push(event(
                WorkflowLevel::Success,
                format!(
                    "Created {} stream {} ({} ch) at {}",
                    spec.direction,
                    spec.name,
                    spec.channels,
                    path.display()
                ),
            )),
            Err(AvirtError::StreamExists(path)) if options.skip_existing => events.push(event(
                WorkflowLevel::Info,
                format!("Stream already present at {}", path.display()),
            )),
            Err(err) => return Err(err),
        }
    }

    if options.seal {
        session.card_seal()?;
        events.push(event(WorkflowLevel::Success, "Card sealed."));
        match session.card_index() {
            Ok(index) => events.push(event(
                WorkflowLevel::Info,
                format!("Card registered as index {index}."),
            )),
            Err(err) => events.push(event(
                WorkflowLevel::Warn,
                format!("Sealed, but the registered card could not be located: {err}"),
            )),
        }
    } else {
        events.push(event(
            WorkflowLevel::Info,
            "Leaving card unsealed; run `avirt seal` once all streams exist.",
        ));
    }

    Ok(WorkflowReport {
        title: format!("Applied {} stream(s)", streams.len()),
        events,
    })
}
