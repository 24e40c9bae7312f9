//! One open video: the cue store, the playback state and the subtitle API wired together.

use crate::editor::{format_field_time, TimelineEditor, Transport};
use crate::error::{Error, Result};
use crate::playback::{SubtitleDisplay, Synchronizer, Tick};
use crate::remote::{SubtitleApi, VideoResolver};
use crate::srt;
use crate::store::Cue;
use crate::version::{Revision, SaveRequest, SubtitleKey};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, trace};

/// A user intent or a clock notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Loaded { duration: Duration },
    Tick(Duration),
    ClickCue(usize),
    EditText { index: usize, text: String },
    EditStart { index: usize, value: String },
    EditEnd { index: usize, value: String },
    AddAfter(usize),
    Delete(usize),
    TogglePlay,
    Rewind,
    Forward,
}

/// One row of the cue list as the editor column shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueRow {
    pub number: usize,
    pub start: String,
    pub end: String,
    pub text: String,
    pub inverted: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub playing: bool,
    pub current_time: String,
    pub total_time: String,
}

/// Declarative snapshot handed to the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub video_url: String,
    pub cues: Vec<CueRow>,
    pub subtitle: SubtitleDisplay,
    pub control: Control,
}

pub struct Session<A> {
    key: SubtitleKey,
    video_url: String,
    editor: TimelineEditor,
    playback: Synchronizer,
    api: A,
    timeout: Duration,
}

async fn bounded<T, F>(timeout: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Remote(format!("{what} timed out after {timeout:?}")))?
}

impl<A: SubtitleApi> Session<A> {
    /// Resolve the video, then load its subtitle or seed one empty cue.
    pub async fn open<R>(resolver: &R, api: A, key: SubtitleKey, timeout: Duration) -> Result<Self>
    where
        R: VideoResolver + ?Sized,
    {
        key.validate()?;
        trace!("open {}/{}", key.platform, key.video_id);
        let video_url = bounded(timeout, "video lookup", resolver.resolve(&key.video_id)).await?;
        let cues = match bounded(timeout, "subtitle fetch", api.fetch(&key)).await? {
            Some(text) => {
                let cues = srt::parse(&text)?;
                info!("loaded {} cues for {}", cues.len(), key.video_id);
                cues
            }
            None => {
                info!("no subtitle for {}, starting empty", key.video_id);
                vec![Cue::anchored(1, Duration::ZERO)]
            }
        };
        let mut editor = TimelineEditor::default();
        editor.load(cues);
        Ok(Self {
            key,
            video_url,
            editor,
            playback: Synchronizer::new(),
            api,
            timeout,
        })
    }

    pub fn key(&self) -> &SubtitleKey {
        &self.key
    }

    pub fn editor(&self) -> &TimelineEditor {
        &self.editor
    }

    pub fn playback(&self) -> &Synchronizer {
        &self.playback
    }

    /// Apply one event. Failed edits leave every cue as it was.
    pub fn handle(&mut self, event: Event) -> Result<Tick> {
        trace!("handle {:?}", event);
        match event {
            Event::Loaded { duration } => self.playback.loaded(duration),
            Event::Tick(now) => return Ok(self.playback.tick(now, self.editor.store())),
            Event::ClickCue(i) => {
                let start = self.editor.store().at(i)?.start;
                self.playback.request_seek(start);
            }
            Event::EditText { index, text } => {
                self.editor.update_text(index, text, &mut self.playback)?
            }
            Event::EditStart { index, value } => {
                self.editor.retime_start(index, &value)?;
            }
            Event::EditEnd { index, value } => {
                self.editor.retime_end(index, &value)?;
            }
            Event::AddAfter(i) => {
                self.editor.split(i, self.playback.current_time())?;
            }
            Event::Delete(i) => {
                self.editor.delete(i)?;
            }
            Event::TogglePlay => self.playback.toggle(),
            Event::Rewind => self.playback.rewind(),
            Event::Forward => self.playback.forward(),
        }
        Ok(Tick::default())
    }

    pub fn view(&self) -> View {
        let active = self.playback.active();
        let cues = self
            .editor
            .store()
            .iter()
            .enumerate()
            .map(|(i, cue)| CueRow {
                number: i + 1,
                start: format_field_time(cue.start),
                end: format_field_time(cue.end),
                text: cue.text.clone(),
                inverted: cue.is_inverted(),
                active: active == Some(i),
            })
            .collect();
        View {
            video_url: self.video_url.clone(),
            cues,
            subtitle: self.playback.display().clone(),
            control: Control {
                playing: self.playback.is_playing(),
                current_time: format_field_time(self.playback.current_time()),
                total_time: format_field_time(self.playback.total_time()),
            },
        }
    }

    /// Serialize the cues and submit them as a new revision.
    pub async fn save(&self, submitter_ip: &str) -> Result<Revision> {
        let request = SaveRequest {
            key: self.key.clone(),
            submitter_ip: submitter_ip.to_string(),
            subtitle: srt::serialize(self.editor.store().as_slice()),
        };
        debug!("saving {} cues", self.editor.store().len());
        let revision = bounded(self.timeout, "save", self.api.save(request)).await?;
        info!("saved {} as {}", self.key.video_id, revision);
        Ok(revision)
    }
}
