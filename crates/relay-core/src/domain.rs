use std::fmt;

/// Chat id (numeric) on either side of the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

/// Source-side sub-conversation (forum topic) id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceTopicId(pub i64);

/// Destination-side container (forum topic / channel) id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub i64);

/// Source message id, carried for logs only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A (source, destination) relay pairing. Every piece of relay state is scoped to one pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatPair {
    pub source: ChatId,
    pub destination: ChatId,
}

/// Where an outbound payload goes inside the destination chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The chat's default, non-topic surface.
    Primary,
    Container(ContainerId),
}

impl Target {
    pub fn from_container(container: Option<ContainerId>) -> Self {
        container.map_or(Target::Primary, Target::Container)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SourceTopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Primary => f.write_str("primary"),
            Target::Container(id) => write!(f, "container {id}"),
        }
    }
}
