mod common;

use std::{sync::atomic::Ordering, sync::Arc};

use tokio::task::LocalSet;

use local_media::{
    conf, effects::SegmenterCache, Conf, MediaKind, TrackOrigin, UserMedia,
};

use self::common::{settle, MockLoader, MockMediaDevices, Mocks};

#[tokio::test(start_paused = true)]
async fn instances_share_one_loaded_segmenter() {
    LocalSet::new()
        .run_until(async {
            let loader = MockLoader::default();
            let cache = || {
                SegmenterCache::global_or_install(|| {
                    SegmenterCache::new(
                        loader.clone(),
                        conf::Segmenter::default(),
                    )
                })
            };
            let (first, second) = (
                Mocks::new(MockMediaDevices::with_default_devices()),
                Mocks::new(MockMediaDevices::with_default_devices()),
            );
            let user_media = |mocks: &Mocks| {
                let mut platform = mocks.platform();
                platform.segmenters = cache();
                UserMedia::new(&Conf::default(), platform)
            };
            let (first_media, second_media) =
                (user_media(&first), user_media(&second));

            let first_camera = first_media.camera();
            let second_camera = second_media.camera();
            for media in &[&first_media, &second_media] {
                media.set_enabled(MediaKind::Video, true);
                media.set_blur_enabled(true);
            }
            settle().await;

            for camera in &[&first_camera, &second_camera] {
                let track = camera.current().unwrap();
                assert_eq!(track.origin(), TrackOrigin::Blurred);
            }
            assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
            assert!(Arc::ptr_eq(
                &cache(),
                &SegmenterCache::global().unwrap(),
            ));
            assert!(SegmenterCache::global().unwrap().is_loaded());
        })
        .await;
}
