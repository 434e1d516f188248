//! Matching policy: a sequential, short-circuiting scan of registered users
//! with the pairwise judgments delegated to a [`FaceJudge`].

use tracing::{debug, warn};

use super::FaceJudge;
use crate::images::services::{parse_data_url, InlineImage};
use crate::users::repo::User;

/// Scan candidates in registration order and accept the first one with at
/// least `quorum` affirmative judgments across its three reference images.
///
/// Judge failures count as negative judgments, a candidate with an
/// unparseable stored image is skipped, and remaining comparisons for a
/// candidate stop once the quorum is reached.
pub async fn find_match(
    judge: &dyn FaceJudge,
    captured: &InlineImage,
    users: &[User],
    quorum: usize,
) -> Option<User> {
    for user in users {
        let mut references = Vec::with_capacity(3);
        for (pose, payload) in user.images.poses() {
            match parse_data_url(payload) {
                Ok(img) => references.push((pose, img)),
                Err(e) => {
                    warn!(
                        user = %user.name, pose, error = %e,
                        "stored reference image is invalid; skipping candidate"
                    );
                    references.clear();
                    break;
                }
            }
        }
        if references.is_empty() {
            continue;
        }

        let mut votes = 0usize;
        for (pose, reference) in &references {
            match judge.same_person(captured, reference).await {
                Ok(true) => votes += 1,
                Ok(false) => {}
                Err(e) => {
                    debug!(user = %user.name, pose, error = %e, "judgment failed; counting as no");
                }
            }
            if votes >= quorum {
                break;
            }
        }

        debug!(user = %user.name, votes, quorum, "candidate scored");
        if votes >= quorum {
            return Some(user.clone());
        }
    }
    None
}
