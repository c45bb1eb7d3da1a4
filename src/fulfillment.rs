use crate::client::GiftService;
use crate::error::{Result, ValidationError};
use crate::models::{
    CheckoutRequest, CheckoutResult, EmailResult, GiftRef, PostcardEmailRequest, PostcardRequest,
    PostcardResult, Price,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Downstream actions on an accepted or historical suggestion.
///
/// Each action is a single stateless call, so one `Fulfillment` can be cloned
/// and driven from many tasks at once.
pub struct Fulfillment<S> {
    service: Arc<S>,
}

impl<S> Clone for Fulfillment<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<S: GiftService> Fulfillment<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    /// Open a checkout session. On success the caller hands the user off to
    /// `checkout_url`.
    pub async fn order(&self, gift: &str, recipient: &str, price: Price) -> Result<CheckoutResult> {
        let gift_ref = validated(gift, recipient)?;
        if price.is_zero() {
            return Err(ValidationError::InvalidPrice.into());
        }
        let req = CheckoutRequest {
            gift: gift_ref.gift,
            recipient: gift_ref.recipient,
            price,
        };
        let result = self.service.checkout(&req).await.inspect_err(|e| {
            warn!(recipient = %req.recipient, error = %e, "checkout failed");
        })?;
        info!(recipient = %req.recipient, %price, url = %result.checkout_url, "checkout session ready");
        Ok(result)
    }

    pub async fn order_ref(&self, gift: &GiftRef, price: Price) -> Result<CheckoutResult> {
        self.order(&gift.gift, &gift.recipient, price).await
    }

    /// Render a postcard for the gift. A failure carries the service's own
    /// reason when it gave one.
    pub async fn generate_postcard(&self, gift: &str, recipient: &str) -> Result<PostcardResult> {
        let gift_ref = validated(gift, recipient)?;
        let req = PostcardRequest {
            gift: gift_ref.gift,
            recipient: gift_ref.recipient,
        };
        let result = self.service.render_postcard(&req).await.inspect_err(|e| {
            warn!(recipient = %req.recipient, error = %e, "postcard render failed");
        })?;
        info!(recipient = %req.recipient, image = %result.image_url, "postcard rendered");
        Ok(result)
    }

    pub async fn generate_postcard_ref(&self, gift: &GiftRef) -> Result<PostcardResult> {
        self.generate_postcard(&gift.gift, &gift.recipient).await
    }

    /// Email a rendered postcard.
    ///
    /// `image_url` is expected to come from a successful
    /// [`generate_postcard`](Self::generate_postcard) for the same recipient;
    /// that pairing is the caller's responsibility and is not checked here.
    pub async fn email_postcard(
        &self,
        image_url: &str,
        recipient_name: &str,
        recipient_email: &str,
    ) -> Result<EmailResult> {
        if image_url.trim().is_empty() {
            return Err(ValidationError::BlankField { field: "image_url" }.into());
        }
        if recipient_name.trim().is_empty() {
            return Err(ValidationError::MissingRecipient.into());
        }
        check_email(recipient_email)?;
        let req = PostcardEmailRequest {
            recipient_name: recipient_name.trim().to_string(),
            recipient_email: recipient_email.trim().to_string(),
            image_url: image_url.trim().to_string(),
        };
        let result = self.service.email_postcard(&req).await.inspect_err(|e| {
            warn!(recipient = %req.recipient_name, error = %e, "postcard email failed");
        })?;
        info!(recipient = %req.recipient_name, "postcard emailed");
        Ok(result)
    }
}

fn validated(gift: &str, recipient: &str) -> Result<GiftRef> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(ValidationError::MissingRecipient.into());
    }
    let gift = gift.trim();
    if gift.is_empty() {
        return Err(ValidationError::BlankField { field: "gift" }.into());
    }
    Ok(GiftRef::new(gift, recipient))
}

fn check_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()).into())
    }
}
