//! Process-wide session: singleton manager and reaper client

mod manager;
mod reaper;

pub use manager::{
    session, Session, LANG_LABEL, MARKER_LABEL, SESSION_ID_LABEL, VERSION_LABEL,
};
