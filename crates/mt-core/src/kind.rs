//! Vehicle kinds sharing the road graph.

/// The physical class of a vehicle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleKind {
    #[default]
    Car,
    Bicycle,
    Bus,
    Train,
    Ferry,
}

impl VehicleKind {
    /// Kinds that run to a timetable and dwell at stations.
    #[inline]
    pub fn is_scheduled(self) -> bool {
        matches!(self, VehicleKind::Bus | VehicleKind::Train | VehicleKind::Ferry)
    }

    /// Kinds propelled by a motor (as opposed to a rider).
    #[inline]
    pub fn is_motorised(self) -> bool {
        !matches!(self, VehicleKind::Bicycle)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleKind::Car => "car",
            VehicleKind::Bicycle => "bicycle",
            VehicleKind::Bus => "bus",
            VehicleKind::Train => "train",
            VehicleKind::Ferry => "ferry",
        }
    }
}

impl std::fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
