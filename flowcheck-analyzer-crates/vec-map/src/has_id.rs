/// Nodes that know their own key, so they can be inserted without one.
pub trait HasId {
    type Id;

    fn id(&self) -> Self::Id;
}
