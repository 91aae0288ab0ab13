//! The contract every reply-by-email extension implements.

use rbe_core::{
    ActivityItem, ActivityListener, ExtensionDescriptor, ItemId, ParamRegistry, ParsedEmail,
    PostFailure, Querystring, ReportContext,
};

/// A feature module that turns inbound replies for one item type into
/// posted content.
///
/// Only [`post`](Self::post) is required. The chain operations default to
/// the behaviour driven by the extension's [`ExtensionDescriptor`]; the
/// logging hooks default to identity.
///
/// Every method receives the descriptor the extension was bootstrapped with,
/// so implementors do not have to store it themselves.
///
/// # Example
///
/// ```rust,ignore
/// struct GroupReply;
///
/// impl Extension for GroupReply {
///     fn post(
///         &self,
///         descriptor: &ExtensionDescriptor,
///         data: &ParsedEmail,
///         params: &ParamRegistry,
///     ) -> Result<ItemId, PostFailure> {
///         let group = params
///             .item_id(descriptor.primary_param())
///             .ok_or_else(|| PostFailure::extension("no_group", "group id missing"))?;
///         Ok(create_group_update(group, &data.sender, &data.content))
///     }
/// }
/// ```
pub trait Extension: Send + Sync + 'static {
    /// Creates the domain item for a parsed reply.
    ///
    /// `params` carries the decoded values of every registered parameter.
    /// Failures are returned, never raised.
    fn post(
        &self,
        descriptor: &ExtensionDescriptor,
        data: &ParsedEmail,
        params: &ParamRegistry,
    ) -> Result<ItemId, PostFailure>;

    /// Claims `listener` for this extension when `item` is of its event type.
    ///
    /// Override for items whose ids are derived differently.
    fn extend_activity_listener(
        &self,
        descriptor: &ExtensionDescriptor,
        listener: ActivityListener,
        item: &ActivityItem,
    ) -> ActivityListener {
        descriptor.fill_listener(listener, item)
    }

    /// Replaces `querystring` with this extension's segment when it owns
    /// `listener`.
    fn extend_querystring(
        &self,
        descriptor: &ExtensionDescriptor,
        querystring: Querystring,
        listener: &ActivityListener,
    ) -> Querystring {
        descriptor.querystring_for(querystring, listener)
    }

    /// Reserves this extension's parameter names.
    fn register_params(
        &self,
        descriptor: &ExtensionDescriptor,
        params: ParamRegistry,
    ) -> ParamRegistry {
        descriptor.register_params(params)
    }

    /// Contributes to the operator log text of a failed email.
    fn internal_log(
        &self,
        _descriptor: &ExtensionDescriptor,
        log: String,
        _ctx: &ReportContext<'_>,
    ) -> String {
        log
    }

    /// Contributes to the message sent back to the sender of a failed email.
    fn failure_message_to_sender(
        &self,
        _descriptor: &ExtensionDescriptor,
        message: String,
        _ctx: &ReportContext<'_>,
    ) -> String {
        message
    }
}
