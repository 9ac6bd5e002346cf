//! Supertraits for common effect combinations

use super::{
    ConnectionEffects, KeyIssuerEffects, NotificationEffects, RecordStorageEffects,
    TransportEffects,
};

/// Effects needed by the coordinator: record storage, key issuance and
/// change notification.
pub trait CoordinatorEffects: RecordStorageEffects + KeyIssuerEffects + NotificationEffects {
    // Blanket-implemented; not meant to be implemented directly
}

/// Automatic implementation for types that satisfy the required bounds
impl<T> CoordinatorEffects for T where
    T: RecordStorageEffects + KeyIssuerEffects + NotificationEffects
{
}

/// Everything a protocol handler may touch: coordinator effects plus the
/// connection oracle and the reply transport.
pub trait MediationEffects: CoordinatorEffects + ConnectionEffects + TransportEffects {
    // Blanket-implemented; not meant to be implemented directly
}

/// Automatic implementation for types that satisfy the required bounds
impl<T> MediationEffects for T where T: CoordinatorEffects + ConnectionEffects + TransportEffects {}
