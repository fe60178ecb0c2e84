/// A platform event translated into the fields the core actually reads —
/// the specific Messenger/WhatsApp wire shapes stop at the adapter per the
/// spec's "out of scope beyond signature verification and the fields the
/// core reads" framing.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    /// The platform identifier the message was sent *to* — used to resolve
    /// which business owns this conversation.
    pub recipient_platform_id: String,
    /// The platform identifier the message was sent *from* — used to
    /// resolve/create the internal user.
    pub sender_platform_id: String,
    pub text: String,
}
