//! Generated gRPC contracts for the Lighthouse control plane.

pub mod host_agent {
    tonic::include_proto!("lighthouse.host_agent");
}

pub mod registry_monitor {
    tonic::include_proto!("lighthouse.registry_monitor");
}

pub mod tui {
    tonic::include_proto!("lighthouse.tui");
}

#[cfg(test)]
mod tests {
    use super::host_agent::{UpdateStatus, update_status};

    #[test]
    fn stage_enum_round_trips_through_i32() {
        let mut status = UpdateStatus::default();
        status.set_stage(update_status::Stage::Rollback);
        assert_eq!(status.stage(), update_status::Stage::Rollback);
        assert_eq!(
            update_status::Stage::try_from(status.stage).unwrap(),
            update_status::Stage::Rollback
        );
    }
}
