/// Node phases. Transitions only ever move forward.
///
/// Updates happen while [`LifeCycle::Attached`] and don't change the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifeCycle {
	Start,
	Created,
	Attached,
	Detached,
	Disposed,
}
impl Default for LifeCycle {
	fn default() -> Self {
		Self::Start
	}
}
impl LifeCycle {
	/// Moves to `phase` if that is a step forward. Returns whether anything changed.
	pub fn to_phase(&mut self, phase: LifeCycle) -> bool {
		if phase > *self {
			*self = phase;
			true
		} else {
			false
		}
	}

	#[must_use]
	pub fn is_created(self) -> bool {
		self >= LifeCycle::Created
	}

	#[must_use]
	pub fn is_attached(self) -> bool {
		self == LifeCycle::Attached
	}

	#[must_use]
	pub fn is_disposed(self) -> bool {
		self == LifeCycle::Disposed
	}
}
