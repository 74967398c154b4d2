use state_machines::state_machine;

state_machine! {
    name: ReloadMachine,
    state: ReloadState,
    initial: Idle,
    states: [Idle, ConnectingToStore, ResettingIndex, DiscoveringFiles, ParsingAndLoading, Done, Failed],
    events {
        connect { transition: { from: Idle, to: ConnectingToStore } }
        reset { transition: { from: ConnectingToStore, to: ResettingIndex } }
        discover { transition: { from: ResettingIndex, to: DiscoveringFiles } }
        load { transition: { from: DiscoveringFiles, to: ParsingAndLoading } }
        finish { transition: { from: ParsingAndLoading, to: Done } }
        fail {
            transition: { from: ConnectingToStore, to: Failed }
            transition: { from: ResettingIndex, to: Failed }
            transition: { from: DiscoveringFiles, to: Failed }
        }
    }
}

pub fn idle() -> ReloadMachine<(), Idle> {
    ReloadMachine::new(())
}
