use tracing::{error, info};

use crate::contract::{LinkCard, PipelineError, PostVariant, Publisher};

/// Publishes every post in order, one call each. The first rejection aborts the run.
///
/// Returns the number of posts published.
pub async fn publish_posts<P>(posts: Vec<PostVariant>, publisher: &P) -> Result<usize, PipelineError>
where
    P: Publisher + ?Sized,
{
    if posts.is_empty() {
        info!("No posts to publish.");
        return Ok(0);
    }

    let total = posts.len();
    for (index, post) in posts.into_iter().enumerate() {
        let kind = post.kind();
        info!(index, total, kind, "Publishing post");

        let result = match &post {
            PostVariant::Text { text } => publisher.send_post(text).await,
            PostVariant::Image {
                text,
                image_data,
                alt_text,
            } => publisher.send_image(text, image_data, alt_text).await,
            PostVariant::Card {
                text,
                image_data,
                card_title,
                card_description,
                card_uri,
            } => {
                let card = LinkCard {
                    title: card_title.clone(),
                    description: card_description.clone(),
                    uri: card_uri.clone(),
                };
                publisher.send_card(text, image_data, &card).await
            }
        };

        if let Err(e) = result {
            error!(error = %e, index, kind, "Request rejected");
            return Err(PipelineError::Publish(format!(
                "request rejected when publishing {kind}: {e}"
            )));
        }
        info!(index, kind, "Published post");
    }

    Ok(total)
}
