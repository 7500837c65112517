//! Feed slot planning for ranked ads.

use feedads_core::types::{AbTest, Ad, Variant};
use feedads_targeting::RankedAd;

/// Fill the three feed ad slots: best post, best video, then the second post
/// (or the second video when there is no second post). Empty slots are dropped.
pub fn plan_feed_slots(ranked: &[RankedAd]) -> Vec<Ad> {
    let posts: Vec<&Ad> = ranked.iter().map(|r| &r.ad).filter(|ad| !ad.is_video()).collect();
    let videos: Vec<&Ad> = ranked.iter().map(|r| &r.ad).filter(|ad| ad.is_video()).collect();

    [
        posts.first().copied(),
        videos.first().copied(),
        posts.get(1).or(videos.get(1)).copied(),
    ]
    .into_iter()
    .flatten()
    .cloned()
    .collect()
}

/// Swap in the test creative for `variant` and tag the ad with it, so later
/// impressions and clicks are attributed to that variant.
pub fn apply_variant(ad: &mut Ad, test: &AbTest, variant: Variant) {
    ad.content = Some(test.creative(variant).clone());
    ad.ab_test_id = Some(test.id);
    ad.ab_variant = Some(variant);
}
