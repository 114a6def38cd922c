//! Controllable mocks of the platform collaborators.

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    channel::oneshot,
    future::{self, LocalBoxFuture},
};
use image::{Rgba, RgbaImage};
use local_media::{
    conf,
    effects::{
        ForegroundMask, SegmentationError, Segmenter, SegmenterCache,
        SegmenterLoader,
    },
    platform::{
        self, ContentHint, FrameSurface, MediaDevices, MediaStreamTrack,
        MediaStreamTrackState, NoiseSuppressor, SurfaceFactory,
    },
    settings::{MemoryStore, SettingsStore},
    InputDeviceInfo, MediaKind, Platform,
};
use local_media_reactive::ObservableCell;
use tracerr::Traced;

/// Size of frames produced by mocked video tracks.
pub const FRAME_SIZE: u32 = 8;

/// Color of frames produced by mocked video tracks.
pub const FRAME_COLOR: Rgba<u8> = Rgba([200, 120, 40, 255]);

/// Lets all the spawned tasks make progress.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Mocked platform track.
#[derive(Debug)]
pub struct MockTrack {
    id: String,
    kind: MediaKind,
    device_id: Option<String>,
    ended: Rc<ObservableCell<bool>>,
    stopped: Cell<bool>,
    hint: Cell<Option<ContentHint>>,
}

impl MockTrack {
    pub fn new(
        id: impl Into<String>,
        kind: MediaKind,
        device_id: Option<String>,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: id.into(),
            kind,
            device_id,
            ended: Rc::new(ObservableCell::new(false)),
            stopped: Cell::new(false),
            hint: Cell::new(None),
        })
    }

    /// Ends this track the way the platform does: device unplugged or
    /// capture stopped through the system UI.
    pub fn end_externally(&self) {
        self.ended.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Indicates whether this track is neither stopped nor ended.
    pub fn is_live(&self) -> bool {
        !self.stopped.get() && !self.ended.get()
    }

    pub fn hint(&self) -> Option<ContentHint> {
        self.hint.get()
    }
}

impl MediaStreamTrack for MockTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn device_id(&self) -> Option<String> {
        self.device_id.clone()
    }

    fn width(&self) -> Option<u32> {
        (self.kind == MediaKind::Video).then(|| FRAME_SIZE)
    }

    fn height(&self) -> Option<u32> {
        (self.kind == MediaKind::Video).then(|| FRAME_SIZE)
    }

    fn ready_state(&self) -> MediaStreamTrackState {
        if self.is_live() {
            MediaStreamTrackState::Live
        } else {
            MediaStreamTrackState::Ended
        }
    }

    fn set_content_hint(&self, hint: ContentHint) {
        self.hint.set(Some(hint));
    }

    fn on_ended(&self) -> LocalBoxFuture<'static, ()> {
        let ended = self.ended.when_eq(true);
        Box::pin(async move {
            if ended.await.is_err() {
                future::pending::<()>().await;
            }
        })
    }

    fn stop(&self) {
        self.stopped.set(true);
    }
}

#[derive(Default)]
struct DevicesState {
    devices: Vec<InputDeviceInfo>,
    device_errors: HashMap<String, platform::Error>,
    error: Option<platform::Error>,
    display_error: Option<platform::Error>,
    gated: bool,
    deliver_ended: bool,
    pending: Vec<oneshot::Sender<()>>,
    requests: Vec<(MediaKind, Option<String>)>,
    tracks: Vec<Rc<MockTrack>>,
    display_tracks: Vec<Rc<MockTrack>>,
    placeholders: Vec<Rc<MockTrack>>,
}

/// Mocked [`MediaDevices`] with error injection and gated acquisitions.
#[derive(Default)]
pub struct MockMediaDevices(RefCell<DevicesState>);

impl MockMediaDevices {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Creates [`MockMediaDevices`] with `cam-A`, `cam-B` and `mic-A`
    /// connected.
    pub fn with_default_devices() -> Rc<Self> {
        let this = Self::new();
        this.connect("cam-A", MediaKind::Video);
        this.connect("cam-B", MediaKind::Video);
        this.connect("mic-A", MediaKind::Audio);
        this
    }

    pub fn connect(&self, device_id: &str, kind: MediaKind) {
        self.0.borrow_mut().devices.push(InputDeviceInfo::new(
            device_id,
            kind,
            format!("{} label", device_id),
            "group",
        ));
    }

    /// Makes acquisitions of the provided `device_id` fail.
    pub fn fail_device(&self, device_id: &str, err: platform::Error) {
        drop(
            self.0
                .borrow_mut()
                .device_errors
                .insert(device_id.to_owned(), err),
        );
    }

    /// Makes every device acquisition fail.
    pub fn fail_all(&self, err: platform::Error) {
        self.0.borrow_mut().error = Some(err);
    }

    /// Removes all the injected errors.
    pub fn recover(&self) {
        let mut state = self.0.borrow_mut();
        state.error = None;
        state.display_error = None;
        state.device_errors.clear();
    }

    /// Makes display captures fail.
    pub fn fail_display(&self, err: platform::Error) {
        self.0.borrow_mut().display_error = Some(err);
    }

    /// Makes all further device acquisitions return already ended tracks.
    pub fn deliver_ended(&self) {
        self.0.borrow_mut().deliver_ended = true;
    }

    /// Holds all further acquisitions until [`MockMediaDevices::release()`]
    /// is called.
    pub fn hold(&self) {
        self.0.borrow_mut().gated = true;
    }

    /// Lets all held acquisitions complete.
    pub fn release(&self) {
        let pending = {
            let mut state = self.0.borrow_mut();
            state.gated = false;
            std::mem::take(&mut state.pending)
        };
        for tx in pending {
            let _ = tx.send(());
        }
    }

    pub fn requests(&self) -> Vec<(MediaKind, Option<String>)> {
        self.0.borrow().requests.clone()
    }

    /// Returns all the device tracks created so far.
    pub fn tracks(&self) -> Vec<Rc<MockTrack>> {
        self.0.borrow().tracks.clone()
    }

    pub fn live_tracks(&self) -> Vec<Rc<MockTrack>> {
        self.tracks().into_iter().filter(|t| t.is_live()).collect()
    }

    pub fn display_tracks(&self) -> Vec<Rc<MockTrack>> {
        self.0.borrow().display_tracks.clone()
    }

    async fn wait_released(&self) {
        let rx = {
            let mut state = self.0.borrow_mut();
            if !state.gated {
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.pending.push(tx);
            rx
        };
        let _ = rx.await;
    }
}

#[async_trait(?Send)]
impl MediaDevices for MockMediaDevices {
    async fn enumerate_devices(
        &self,
    ) -> Result<Vec<InputDeviceInfo>, Traced<platform::Error>> {
        Ok(self.0.borrow().devices.clone())
    }

    async fn get_user_media(
        &self,
        kind: MediaKind,
        device_id: Option<String>,
    ) -> Result<Rc<dyn MediaStreamTrack>, Traced<platform::Error>> {
        self.0.borrow_mut().requests.push((kind, device_id.clone()));
        self.wait_released().await;

        let mut state = self.0.borrow_mut();
        if let Some(err) = &state.error {
            return Err(tracerr::new!(err.clone()));
        }
        if let Some(err) = device_id
            .as_ref()
            .and_then(|id| state.device_errors.get(id))
        {
            return Err(tracerr::new!(err.clone()));
        }
        let id = format!(
            "{}-{}",
            device_id.as_deref().unwrap_or("default"),
            state.tracks.len(),
        );
        let track = MockTrack::new(id, kind, device_id);
        if state.deliver_ended {
            track.end_externally();
        }
        state.tracks.push(Rc::clone(&track));
        Ok(track)
    }

    async fn get_display_media(
        &self,
    ) -> Result<Rc<dyn MediaStreamTrack>, Traced<platform::Error>> {
        self.wait_released().await;

        let mut state = self.0.borrow_mut();
        if let Some(err) = &state.display_error {
            return Err(tracerr::new!(err.clone()));
        }
        let id = format!("display-{}", state.display_tracks.len());
        let track = MockTrack::new(id, MediaKind::Video, None);
        state.display_tracks.push(Rc::clone(&track));
        Ok(track)
    }

    fn placeholder_track(&self, kind: MediaKind) -> Rc<dyn MediaStreamTrack> {
        let mut state = self.0.borrow_mut();
        let id = format!("placeholder-{}-{}", kind, state.placeholders.len());
        let track = MockTrack::new(id, kind, None);
        state.placeholders.push(Rc::clone(&track));
        track
    }
}

/// Mocked off-screen surface.
#[derive(Debug)]
pub struct MockSurface {
    output: Rc<MockTrack>,
    last_frame: RefCell<Option<RgbaImage>>,
    stats: Rc<SurfaceStats>,
}

impl FrameSurface for MockSurface {
    fn current_frame(&self) -> Option<RgbaImage> {
        Some(RgbaImage::from_pixel(FRAME_SIZE, FRAME_SIZE, FRAME_COLOR))
    }

    fn render(&self, frame: RgbaImage) {
        self.stats.rendered.set(self.stats.rendered.get() + 1);
        *self.last_frame.borrow_mut() = Some(frame);
    }

    fn capture_track(&self) -> Rc<dyn MediaStreamTrack> {
        Rc::clone(&self.output) as Rc<dyn MediaStreamTrack>
    }
}

impl Drop for MockSurface {
    fn drop(&mut self) {
        self.stats.alive.set(self.stats.alive.get() - 1);
    }
}

/// Counters shared by all the surfaces of a [`MockSurfaceFactory`].
#[derive(Debug, Default)]
pub struct SurfaceStats {
    pub created: Cell<usize>,
    pub alive: Cell<usize>,
    pub rendered: Cell<usize>,
}

/// Mocked [`SurfaceFactory`] remembering the surfaces it creates.
#[derive(Default)]
pub struct MockSurfaceFactory {
    pub stats: Rc<SurfaceStats>,
    surfaces: RefCell<Vec<std::rc::Weak<MockSurface>>>,
}

impl MockSurfaceFactory {
    /// Returns the last frame rendered onto the surface capturing the
    /// provided track.
    pub fn last_frame(&self, track_id: &str) -> Option<RgbaImage> {
        self.surfaces
            .borrow()
            .iter()
            .filter_map(std::rc::Weak::upgrade)
            .find(|s| s.output.id == track_id)
            .and_then(|s| s.last_frame.borrow().clone())
    }
}

impl SurfaceFactory for MockSurfaceFactory {
    fn create_surface(
        &self,
        source: &Rc<dyn MediaStreamTrack>,
        width: u32,
        height: u32,
    ) -> Result<Rc<dyn FrameSurface>, Traced<platform::Error>> {
        assert_eq!((width, height), (FRAME_SIZE, FRAME_SIZE));
        let stats = &self.stats;
        stats.created.set(stats.created.get() + 1);
        stats.alive.set(stats.alive.get() + 1);

        let surface = Rc::new(MockSurface {
            output: MockTrack::new(
                format!("blurred-{}-{}", source.id(), stats.created.get()),
                MediaKind::Video,
                None,
            ),
            last_frame: RefCell::new(None),
            stats: Rc::clone(stats),
        });
        self.surfaces.borrow_mut().push(Rc::downgrade(&surface));
        Ok(surface)
    }
}

/// Mocked [`Segmenter`] marking every pixel as a person.
#[derive(Debug)]
pub struct MockSegmenter {
    calls: Arc<AtomicUsize>,
    delay_ms: Arc<AtomicU64>,
}

#[async_trait]
impl Segmenter for MockSegmenter {
    async fn segment_people(
        &self,
        frame: &RgbaImage,
    ) -> Result<ForegroundMask, Traced<SegmentationError>> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(ForegroundMask::from_pixel(
            frame.width(),
            frame.height(),
            image::Luma([1.0]),
        ))
    }
}

/// Mocked [`SegmenterLoader`] counting loads and segmentations.
#[derive(Clone, Debug, Default)]
pub struct MockLoader {
    pub loads: Arc<AtomicUsize>,
    pub segmentations: Arc<AtomicUsize>,

    /// Duration of every load, in milliseconds.
    pub load_delay_ms: Arc<AtomicU64>,

    /// Duration of every segmentation, in milliseconds.
    pub segment_delay_ms: Arc<AtomicU64>,
}

impl MockLoader {
    pub fn set_load_delay(&self, delay: Duration) {
        self.load_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_segment_delay(&self, delay: Duration) {
        self.segment_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl SegmenterLoader for MockLoader {
    async fn create_segmenter(
        &self,
        _: &conf::Segmenter,
    ) -> Result<Arc<dyn Segmenter>, Traced<SegmentationError>> {
        let _ = self.loads.fetch_add(1, Ordering::SeqCst);
        let delay = self.load_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(Arc::new(MockSegmenter {
            calls: Arc::clone(&self.segmentations),
            delay_ms: Arc::clone(&self.segment_delay_ms),
        }))
    }
}

/// Mocked [`NoiseSuppressor`].
#[derive(Default)]
pub struct MockNoiseSuppressor {
    pub suppressed: RefCell<Vec<Rc<MockTrack>>>,
    pub error: RefCell<Option<platform::Error>>,
}

#[async_trait(?Send)]
impl NoiseSuppressor for MockNoiseSuppressor {
    async fn suppress(
        &self,
        track: Rc<dyn MediaStreamTrack>,
    ) -> Result<Rc<dyn MediaStreamTrack>, Traced<platform::Error>> {
        if let Some(err) = self.error.borrow().clone() {
            return Err(tracerr::new!(err));
        }
        let suppressed = MockTrack::new(
            format!("suppressed-{}", track.id()),
            track.kind(),
            None,
        );
        self.suppressed.borrow_mut().push(Rc::clone(&suppressed));
        Ok(suppressed)
    }
}

/// All the mocks a [`Platform`] is built of.
pub struct Mocks {
    pub devices: Rc<MockMediaDevices>,
    pub surfaces: Rc<MockSurfaceFactory>,
    pub suppressor: Rc<MockNoiseSuppressor>,
    pub settings: Rc<MemoryStore>,
    pub loader: MockLoader,
}

impl Mocks {
    pub fn new(devices: Rc<MockMediaDevices>) -> Self {
        Self {
            devices,
            surfaces: Rc::new(MockSurfaceFactory::default()),
            suppressor: Rc::new(MockNoiseSuppressor::default()),
            settings: Rc::new(MemoryStore::new()),
            loader: MockLoader::default(),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            media_devices: Rc::clone(&self.devices) as Rc<dyn MediaDevices>,
            surfaces: Rc::clone(&self.surfaces) as Rc<dyn SurfaceFactory>,
            noise_suppressor: Rc::clone(&self.suppressor)
                as Rc<dyn NoiseSuppressor>,
            settings: Rc::clone(&self.settings) as Rc<dyn SettingsStore>,
            segmenters: Arc::new(SegmenterCache::new(
                self.loader.clone(),
                conf::Segmenter::default(),
            )),
        }
    }

    pub fn segmentations(&self) -> usize {
        self.loader.segmentations.load(Ordering::SeqCst)
    }
}
