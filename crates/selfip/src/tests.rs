//! Self-IP manager tests

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ipnet::IpNet;
use l3_net_core::{
    AddressBindingRegistrar, DeleteOutcome, Device, NamingResolver, NetworkError, NetworkHelper,
    PortClient, Result, SelfIpResource, VirtualAddressResource, VirtualServiceResource,
    ROUTE_DOMAIN_VLAN_MESSAGE,
};
use l3_shared_types::{
    FixedIp, LoadBalancer, Network, Port, SelfIpAddress, SelfIpModel, Service, Subnet, SubnetInfo,
    VirtualAddress, VirtualServiceModel,
};
use mockall::mock;

use crate::{DefaultNamingResolver, NamingConfig, ReconcilerConfig, SelfIpManager, SelfIpOutcome};

type Key = (String, String);

fn key(name: &str, partition: &str) -> Key {
    (name.to_string(), partition.to_string())
}

/// In-memory appliance recording every remote call
#[derive(Default)]
struct FakeAppliance {
    calls: Mutex<Vec<String>>,
    self_ips: Mutex<HashMap<Key, SelfIpModel>>,
    create_failures: Mutex<VecDeque<NetworkError>>,
    virtuals: Mutex<HashMap<Key, VirtualServiceModel>>,
    traffic_groups: Mutex<HashMap<Key, String>>,
    fail_address_update: Mutex<bool>,
    fail_delete_selfip: Mutex<bool>,
}

impl FakeAppliance {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn fail_next_create(&self, err: NetworkError) {
        self.create_failures.lock().unwrap().push_back(err);
    }

    fn self_ip(&self, name: &str, partition: &str) -> Option<SelfIpModel> {
        self.self_ips.lock().unwrap().get(&key(name, partition)).cloned()
    }

    fn virtual_service(&self, name: &str, partition: &str) -> Option<VirtualServiceModel> {
        self.virtuals.lock().unwrap().get(&key(name, partition)).cloned()
    }
}

#[async_trait]
impl SelfIpResource for FakeAppliance {
    async fn exists(&self, name: &str, partition: &str) -> Result<bool> {
        self.record(format!("selfip.exists {}", name));
        Ok(self.self_ip(name, partition).is_some())
    }

    async fn create(&self, model: &SelfIpModel) -> Result<()> {
        self.record(format!("selfip.create {}", model.name));
        if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.self_ips
            .lock()
            .unwrap()
            .insert(key(&model.name, &model.partition), model.clone());
        Ok(())
    }

    async fn load(&self, name: &str, partition: &str) -> Result<SelfIpModel> {
        self.record(format!("selfip.load {}", name));
        self.self_ip(name, partition)
            .ok_or_else(|| NetworkError::remote(404, "Object not found"))
    }
}

#[async_trait]
impl VirtualServiceResource for FakeAppliance {
    async fn exists(&self, name: &str, partition: &str) -> Result<bool> {
        self.record(format!("virtual.exists {}", name));
        Ok(self.virtual_service(name, partition).is_some())
    }

    async fn create(&self, model: &VirtualServiceModel) -> Result<()> {
        self.record(format!("virtual.create {}", model.name));
        self.virtuals
            .lock()
            .unwrap()
            .insert(key(&model.name, &model.partition), model.clone());
        Ok(())
    }

    async fn load(&self, name: &str, partition: &str) -> Result<VirtualServiceModel> {
        self.record(format!("virtual.load {}", name));
        self.virtual_service(name, partition)
            .ok_or_else(|| NetworkError::remote(404, "Object not found"))
    }

    async fn update(&self, model: &VirtualServiceModel) -> Result<()> {
        self.record(format!("virtual.update {}", model.name));
        self.virtuals
            .lock()
            .unwrap()
            .insert(key(&model.name, &model.partition), model.clone());
        Ok(())
    }

    async fn delete(&self, name: &str, partition: &str) -> Result<()> {
        self.record(format!("virtual.delete {}", name));
        self.virtuals.lock().unwrap().remove(&key(name, partition));
        Ok(())
    }
}

#[async_trait]
impl VirtualAddressResource for FakeAppliance {
    async fn load(&self, name: &str, partition: &str) -> Result<VirtualAddress> {
        self.record(format!("address.load {}", name));
        Ok(VirtualAddress {
            name: name.to_string(),
            partition: partition.to_string(),
            traffic_group: self
                .traffic_groups
                .lock()
                .unwrap()
                .get(&key(name, partition))
                .cloned(),
        })
    }

    async fn update(&self, address: &VirtualAddress) -> Result<()> {
        self.record(format!("address.update {}", address.name));
        if *self.fail_address_update.lock().unwrap() {
            return Err(NetworkError::remote(500, "Internal Server Error"));
        }
        if let Some(group) = &address.traffic_group {
            self.traffic_groups
                .lock()
                .unwrap()
                .insert(key(&address.name, &address.partition), group.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkHelper for FakeAppliance {
    async fn add_vlan_to_domain(
        &self,
        vlan: &str,
        partition: &str,
        preserve_vlan_name: bool,
    ) -> Result<()> {
        self.record(format!(
            "network.add_vlan {} {} preserve={}",
            vlan, partition, preserve_vlan_name
        ));
        Ok(())
    }

    async fn delete_selfip(&self, name: &str, partition: &str) -> Result<DeleteOutcome> {
        self.record(format!("network.delete_selfip {}", name));
        if *self.fail_delete_selfip.lock().unwrap() {
            return Err(NetworkError::remote(500, "Internal Server Error"));
        }
        match self.self_ips.lock().unwrap().remove(&key(name, partition)) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Err(NetworkError::remote(404, "Object not found")),
        }
    }

    async fn arp_delete_by_subnet(
        &self,
        partition: &str,
        subnet: &IpNet,
        _mask: Option<&str>,
    ) -> Result<Vec<IpAddr>> {
        self.record(format!("network.arp_delete {} {}", subnet, partition));
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakePorts {
    ports: Mutex<HashMap<String, Port>>,
    created: Mutex<usize>,
    empty_allocation: bool,
}

#[async_trait]
impl PortClient for FakePorts {
    async fn get_port_by_name(&self, name: &str) -> Result<Vec<Port>> {
        Ok(self.ports.lock().unwrap().get(name).cloned().into_iter().collect())
    }

    async fn create_port_on_subnet(
        &self,
        subnet_id: &str,
        mac_address: Option<&str>,
        name: &str,
        fixed_address_count: usize,
    ) -> Result<Port> {
        assert_eq!(fixed_address_count, 1);
        let mut created = self.created.lock().unwrap();
        *created += 1;

        let fixed_ips = if self.empty_allocation {
            Vec::new()
        } else {
            vec![FixedIp {
                subnet_id: subnet_id.to_string(),
                ip_address: format!("10.0.0.{}", 9 + *created).parse().unwrap(),
            }]
        };
        let port = Port {
            id: format!("port-{}", *created),
            name: name.to_string(),
            subnet_id: subnet_id.to_string(),
            mac_address: mac_address.map(str::to_string),
            fixed_ips,
        };
        self.ports
            .lock()
            .unwrap()
            .insert(name.to_string(), port.clone());
        Ok(port)
    }
}

#[derive(Default)]
struct FakeBinding {
    events: Mutex<Vec<(String, String, IpAddr)>>,
}

#[async_trait]
impl AddressBindingRegistrar for FakeBinding {
    async fn bind_address(&self, subnet_id: &str, ip_address: &IpAddr) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(("bind".to_string(), subnet_id.to_string(), *ip_address));
        Ok(())
    }

    async fn unbind_address(&self, subnet_id: &str, ip_address: &IpAddr) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(("unbind".to_string(), subnet_id.to_string(), *ip_address));
        Ok(())
    }
}

mock! {
    Naming {}

    impl NamingResolver for Naming {
        fn network_name(&self, device_name: &str, network: &Network) -> Result<(String, bool)>;
        fn is_common_network(&self, network: &Network) -> bool;
        fn folder_name(&self, tenant_id: &str) -> String;
    }
}

struct Fixture {
    appliance: Arc<FakeAppliance>,
    ports: Arc<FakePorts>,
    binding: Arc<FakeBinding>,
    device: Device,
    manager: SelfIpManager,
}

fn fixture_with(config: ReconcilerConfig, ports: FakePorts) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let appliance = Arc::new(FakeAppliance::default());
    let ports = Arc::new(ports);
    let binding = Arc::new(FakeBinding::default());
    let device = Device::from_client("dev1", appliance.clone());
    let manager = SelfIpManager::new(
        config,
        Arc::new(DefaultNamingResolver::new(NamingConfig::default())),
        ports.clone(),
    )
    .with_address_binding(binding.clone());

    Fixture {
        appliance,
        ports,
        binding,
        device,
        manager,
    }
}

fn fixture() -> Fixture {
    fixture_with(ReconcilerConfig::default(), FakePorts::default())
}

fn common_network(route_domain_id: Option<u16>) -> Network {
    let mut network = Network::new("n1");
    network.shared = true;
    network.route_domain_id = route_domain_id;
    network.network_type = Some("vlan".to_string());
    network.segmentation_id = Some(100);
    network
}

fn subnet_info(network: Option<Network>) -> SubnetInfo {
    let mut subnet = Subnet::new("s1", "10.0.0.0/24".parse().unwrap(), "t1");
    subnet.gateway_ip = Some("10.0.0.1".parse().unwrap());
    SubnetInfo::new(subnet, network)
}

fn service() -> Service {
    Service {
        loadbalancer: LoadBalancer {
            id: "lb1".to_string(),
            tenant_id: "t1".to_string(),
        },
    }
}

fn local_model(name: &str) -> SelfIpModel {
    SelfIpModel {
        name: name.to_string(),
        address: SelfIpAddress::new("10.0.0.10".parse().unwrap(), Some(2), 24),
        vlan: "vlan-100".to_string(),
        partition: "Common".to_string(),
        floating: false,
        traffic_group: None,
        preserve_vlan_name: false,
    }
}

fn route_domain_error() -> NetworkError {
    NetworkError::remote(
        400,
        format!(
            "01070712:3: Values (10.0.0.10%2) for self IP {}",
            ROUTE_DOMAIN_VLAN_MESSAGE
        ),
    )
}

#[tokio::test]
async fn test_create_self_ip_skips_existing() {
    let f = fixture();
    let model = local_model("local-dev1-s1");

    let first = f.manager.create_self_ip(&f.device, &model).await.unwrap();
    let second = f.manager.create_self_ip(&f.device, &model).await.unwrap();

    assert_eq!(first, SelfIpOutcome::Created);
    assert_eq!(second, SelfIpOutcome::AlreadyPresent);
    assert_eq!(f.appliance.count("selfip.exists"), 2);
    assert_eq!(f.appliance.count("selfip.create"), 1);
}

#[tokio::test]
async fn test_create_self_ip_without_name() {
    let f = fixture();

    let outcome = f
        .manager
        .create_self_ip(&f.device, &local_model(""))
        .await
        .unwrap();

    assert!(!outcome.is_converged());
    assert_eq!(f.appliance.total_calls(), 0);
}

#[tokio::test]
async fn test_vlan_remediation_retries_once() {
    let f = fixture();
    f.appliance.fail_next_create(route_domain_error());

    let outcome = f
        .manager
        .create_self_ip(&f.device, &local_model("local-dev1-s1"))
        .await
        .unwrap();

    assert_eq!(outcome, SelfIpOutcome::Created);
    assert_eq!(f.appliance.count("network.add_vlan vlan-100 Common preserve=false"), 1);
    assert_eq!(f.appliance.count("selfip.create"), 2);
    assert!(f.appliance.self_ip("local-dev1-s1", "Common").is_some());
}

#[tokio::test]
async fn test_failed_retry_is_reported() {
    let f = fixture();
    f.appliance.fail_next_create(route_domain_error());
    f.appliance.fail_next_create(route_domain_error());

    let outcome = f
        .manager
        .create_self_ip(&f.device, &local_model("local-dev1-s1"))
        .await
        .unwrap();

    assert!(matches!(outcome, SelfIpOutcome::Failed(reason) if reason.contains("status 400")));
    assert_eq!(f.appliance.count("network.add_vlan"), 1);
    assert_eq!(f.appliance.count("selfip.create"), 2);
}

#[tokio::test]
async fn test_failed_self_ip_blocks_binding() {
    let f = fixture();
    f.appliance.fail_next_create(route_domain_error());
    f.appliance.fail_next_create(route_domain_error());

    let err = f
        .manager
        .assure_self_ip(&f.device, &service(), &subnet_info(Some(common_network(Some(2)))))
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::SelfIpNotConverged { ref name, .. } if name == "local-dev1-s1"));
    assert!(f.binding.events.lock().unwrap().is_empty());
    assert!(
        !f.manager
            .state()
            .is_tenant_subnet_assured("dev1", "t1", "s1")
            .await
    );
}

#[tokio::test]
async fn test_other_client_error_propagates() {
    let f = fixture();
    f.appliance
        .fail_next_create(NetworkError::remote(400, "01020036:3: The requested VLAN was not found."));

    let err = f
        .manager
        .create_self_ip(&f.device, &local_model("local-dev1-s1"))
        .await
        .unwrap_err();

    match err {
        NetworkError::Remote { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "01020036:3: The requested VLAN was not found.");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(f.appliance.count("network.add_vlan"), 0);
    assert_eq!(f.appliance.count("selfip.create"), 1);
}

#[tokio::test]
async fn test_server_error_is_not_remediated() {
    let f = fixture();
    f.appliance
        .fail_next_create(NetworkError::remote(500, ROUTE_DOMAIN_VLAN_MESSAGE));

    let err = f
        .manager
        .create_self_ip(&f.device, &local_model("local-dev1-s1"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(f.appliance.count("network.add_vlan"), 0);
    assert_eq!(f.appliance.count("selfip.create"), 1);
}

#[tokio::test]
async fn test_assure_self_ip_on_common_network() {
    let f = fixture();

    f.manager
        .assure_self_ip(&f.device, &service(), &subnet_info(Some(common_network(Some(2)))))
        .await
        .unwrap();

    let model = f.appliance.self_ip("local-dev1-s1", "Common").unwrap();
    assert!(model.address.to_string().ends_with("%2/24"));
    assert_eq!(model.address.to_string(), "10.0.0.10%2/24");
    assert_eq!(model.vlan, "vlan-100");
    assert!(!model.floating);

    let events = f.binding.events.lock().unwrap();
    assert_eq!(
        *events,
        vec![(
            "bind".to_string(),
            "s1".to_string(),
            "10.0.0.10".parse::<IpAddr>().unwrap()
        )]
    );
    drop(events);
    assert!(
        f.manager
            .state()
            .is_tenant_subnet_assured("dev1", "t1", "s1")
            .await
    );
}

#[tokio::test]
async fn test_assure_self_ip_is_idempotent() {
    let f = fixture();
    let info = subnet_info(Some(common_network(Some(2))));

    f.manager
        .assure_self_ip(&f.device, &service(), &info)
        .await
        .unwrap();
    f.manager
        .assure_self_ip(&f.device, &service(), &info)
        .await
        .unwrap();
    assert_eq!(f.appliance.count("selfip.create"), 1);
    assert_eq!(f.appliance.count("selfip.exists"), 1);

    // after invalidation the remote state is re-verified, not re-created
    f.manager.state().invalidate_all().await;
    f.manager
        .assure_self_ip(&f.device, &service(), &info)
        .await
        .unwrap();
    assert_eq!(f.appliance.count("selfip.exists"), 2);
    assert_eq!(f.appliance.count("selfip.create"), 1);
    assert_eq!(*f.ports.created.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_assure_self_ip_without_network() {
    let f = fixture();

    f.manager
        .assure_self_ip(&f.device, &service(), &subnet_info(None))
        .await
        .unwrap();

    assert_eq!(f.appliance.total_calls(), 0);
    assert_eq!(*f.ports.created.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_route_domain_defaults_to_zero() {
    let f = fixture();

    f.manager
        .assure_self_ip(&f.device, &service(), &subnet_info(Some(common_network(None))))
        .await
        .unwrap();

    let model = f.appliance.self_ip("local-dev1-s1", "Common").unwrap();
    assert_eq!(model.address.to_string(), "10.0.0.10%0/24");
}

#[tokio::test]
async fn test_existing_port_is_reused() {
    let ports = FakePorts::default();
    ports.ports.lock().unwrap().insert(
        "local-dev1-s1".to_string(),
        Port {
            id: "p1".to_string(),
            name: "local-dev1-s1".to_string(),
            subnet_id: "s1".to_string(),
            mac_address: None,
            fixed_ips: vec![FixedIp {
                subnet_id: "s1".to_string(),
                ip_address: "10.0.0.42".parse().unwrap(),
            }],
        },
    );
    let f = fixture_with(ReconcilerConfig::default(), ports);

    f.manager
        .assure_self_ip(&f.device, &service(), &subnet_info(Some(common_network(Some(2)))))
        .await
        .unwrap();

    assert_eq!(*f.ports.created.lock().unwrap(), 0);
    let model = f.appliance.self_ip("local-dev1-s1", "Common").unwrap();
    assert_eq!(model.address.to_string(), "10.0.0.42%2/24");
}

#[tokio::test]
async fn test_empty_allocation_is_fatal() {
    let ports = FakePorts {
        empty_allocation: true,
        ..Default::default()
    };
    let f = fixture_with(ReconcilerConfig::default(), ports);

    let err = f
        .manager
        .assure_self_ip(&f.device, &service(), &subnet_info(Some(common_network(Some(2)))))
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::Allocation { ref port, .. } if port == "local-dev1-s1"));
    assert_eq!(f.appliance.count("selfip.create"), 0);
}

#[tokio::test]
async fn test_assure_gateway_on_common_network() {
    let f = fixture();

    f.manager
        .assure_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))), "tg1")
        .await
        .unwrap();

    let selfip = f.appliance.self_ip("gw-s1", "Common").unwrap();
    assert!(selfip.floating);
    assert_eq!(selfip.address.to_string(), "10.0.0.1/24");
    assert_eq!(selfip.vlan, "/Common/vlan-100");
    assert_eq!(selfip.traffic_group.as_deref(), Some("tg1"));

    let vs = f.appliance.virtual_service("gw-s1", "Common").unwrap();
    assert_eq!(vs.destination, "0.0.0.0:0");
    assert_eq!(vs.mask, "0.0.0.0");
    assert!(vs.ip_forward);
    assert!(vs.vlans_enabled);
    assert_eq!(vs.vlans, vec!["/Common/vlan-100".to_string()]);

    let groups = f.appliance.traffic_groups.lock().unwrap();
    assert_eq!(groups.get(&key("0.0.0.0:0", "Common")).map(String::as_str), Some("tg1"));
    drop(groups);

    assert!(f.manager.state().is_gateway_assured("dev1", "s1").await);
    assert_eq!(
        f.binding.events.lock().unwrap()[0],
        (
            "bind".to_string(),
            "s1".to_string(),
            "10.0.0.1".parse::<IpAddr>().unwrap()
        )
    );
}

#[tokio::test]
async fn test_assure_gateway_cached_is_noop() {
    let f = fixture();
    f.manager.state().mark_gateway_assured("dev1", "s1").await;

    f.manager
        .assure_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))), "tg1")
        .await
        .unwrap();

    assert_eq!(f.appliance.total_calls(), 0);
    assert!(f.binding.events.lock().unwrap().is_empty());
}

/// Naming for a tenant network whose VLAN name is preserved
fn tenant_naming() -> MockNaming {
    let mut naming = MockNaming::new();
    naming.expect_is_common_network().return_const(false);
    naming
        .expect_network_name()
        .times(1)
        .returning(|_, _| Ok(("tenant-vlan".to_string(), true)));
    naming
        .expect_folder_name()
        .times(1)
        .returning(|tenant| format!("Project_{}", tenant));
    naming
}

fn tenant_network() -> Network {
    let mut network = common_network(Some(2));
    network.shared = false;
    network
}

#[tokio::test]
async fn test_assure_gateway_in_tenant_partition() {
    let appliance = Arc::new(FakeAppliance::default());
    let device = Device::from_client("dev1", appliance.clone());
    let manager = SelfIpManager::new(
        ReconcilerConfig::default(),
        Arc::new(tenant_naming()),
        Arc::new(FakePorts::default()),
    );

    manager
        .assure_gateway(&device, &subnet_info(Some(tenant_network())), "tg2")
        .await
        .unwrap();

    let selfip = appliance.self_ip("gw-s1", "Project_t1").unwrap();
    assert_eq!(selfip.vlan, "tenant-vlan");
    assert!(selfip.preserve_vlan_name);
    let vs = appliance.virtual_service("gw-s1", "Project_t1").unwrap();
    assert_eq!(vs.vlans, vec!["tenant-vlan".to_string()]);
    assert!(vs.preserve_vlan_name);
    assert_eq!(vs.qualified_vlans(), vec![selfip.vlan.clone()]);
}

#[tokio::test]
async fn test_preserved_vlan_is_attached_verbatim() {
    let appliance = Arc::new(FakeAppliance::default());
    let device = Device::from_client("dev1", appliance.clone());
    let manager = SelfIpManager::new(
        ReconcilerConfig::default(),
        Arc::new(tenant_naming()),
        Arc::new(FakePorts::default()),
    );
    appliance.fail_next_create(route_domain_error());

    manager
        .assure_gateway(&device, &subnet_info(Some(tenant_network())), "tg2")
        .await
        .unwrap();

    assert_eq!(
        appliance.count("network.add_vlan tenant-vlan Project_t1 preserve=true"),
        1
    );
    assert_eq!(appliance.count("selfip.create"), 2);
    let selfip = appliance.self_ip("gw-s1", "Project_t1").unwrap();
    let vs = appliance.virtual_service("gw-s1", "Project_t1").unwrap();
    assert_eq!(vs.qualified_vlans(), vec![selfip.vlan]);
    assert!(manager.state().is_gateway_assured("dev1", "s1").await);
}

#[tokio::test]
async fn test_assure_self_ip_in_tenant_partition() {
    let appliance = Arc::new(FakeAppliance::default());
    let device = Device::from_client("dev1", appliance.clone());
    let manager = SelfIpManager::new(
        ReconcilerConfig::default(),
        Arc::new(tenant_naming()),
        Arc::new(FakePorts::default()),
    );
    // the service tenant decides the partition, not the subnet owner
    let service = Service {
        loadbalancer: LoadBalancer {
            id: "lb9".to_string(),
            tenant_id: "t9".to_string(),
        },
    };

    manager
        .assure_self_ip(&device, &service, &subnet_info(Some(tenant_network())))
        .await
        .unwrap();

    let model = appliance.self_ip("local-dev1-s1", "Project_t9").unwrap();
    assert_eq!(model.vlan, "tenant-vlan");
    assert!(model.preserve_vlan_name);
    assert_eq!(model.address.to_string(), "10.0.0.10%2/24");
    assert!(appliance.self_ip("local-dev1-s1", "Project_t1").is_none());
    assert!(manager.state().is_tenant_subnet_assured("dev1", "t9", "s1").await);
    assert!(!manager.state().is_tenant_subnet_assured("dev1", "t1", "s1").await);
}

#[tokio::test]
async fn test_assure_gateway_corrects_drifted_virtual() {
    let f = fixture();
    let mut drifted = VirtualServiceModel::forwarding(
        "gw-s1".to_string(),
        "Common".to_string(),
        "/Common/vlan-999".to_string(),
        false,
    );
    drifted.ip_forward = false;
    f.appliance
        .virtuals
        .lock()
        .unwrap()
        .insert(key("gw-s1", "Common"), drifted);

    f.manager
        .assure_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))), "tg1")
        .await
        .unwrap();

    assert_eq!(f.appliance.count("virtual.create"), 0);
    assert_eq!(f.appliance.count("virtual.update"), 1);
    let vs = f.appliance.virtual_service("gw-s1", "Common").unwrap();
    assert!(vs.ip_forward);
    assert_eq!(vs.vlans, vec!["/Common/vlan-100".to_string()]);
}

#[tokio::test]
async fn test_assure_gateway_keeps_matching_virtual() {
    let f = fixture();
    f.manager
        .assure_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))), "tg1")
        .await
        .unwrap();
    f.manager.state().invalidate_device("dev1").await;

    f.manager
        .assure_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))), "tg1")
        .await
        .unwrap();

    assert_eq!(f.appliance.count("virtual.create"), 1);
    assert_eq!(f.appliance.count("virtual.load"), 1);
    assert_eq!(f.appliance.count("virtual.update"), 0);
    assert_eq!(f.appliance.count("address.update"), 2);
}

#[tokio::test]
async fn test_failed_gateway_is_not_cached() {
    let f = fixture();
    *f.appliance.fail_address_update.lock().unwrap() = true;

    let err = f
        .manager
        .assure_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))), "tg1")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(!f.manager.state().is_gateway_assured("dev1", "s1").await);

    *f.appliance.fail_address_update.lock().unwrap() = false;
    f.manager
        .assure_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))), "tg1")
        .await
        .unwrap();
    assert!(f.manager.state().is_gateway_assured("dev1", "s1").await);
    assert_eq!(f.appliance.count("selfip.create"), 1);
}

#[tokio::test]
async fn test_delete_gateway() {
    let config = ReconcilerConfig {
        populate_static_arp: true,
        ..Default::default()
    };
    let f = fixture_with(config, FakePorts::default());
    let info = subnet_info(Some(common_network(Some(2))));
    f.manager
        .assure_gateway(&f.device, &info, "tg1")
        .await
        .unwrap();

    let name = f.manager.delete_gateway(&f.device, &info).await.unwrap();

    assert_eq!(name.as_deref(), Some("gw-s1"));
    assert_eq!(f.appliance.count("network.arp_delete 10.0.0.0/24 Common"), 1);
    assert!(f.appliance.self_ip("gw-s1", "Common").is_none());
    assert!(f.appliance.virtual_service("gw-s1", "Common").is_none());
    assert_eq!(f.appliance.count("virtual.delete gw-s1"), 1);
    assert!(!f.manager.state().is_gateway_assured("dev1", "s1").await);

    let events = f.binding.events.lock().unwrap();
    assert_eq!(
        events.last().unwrap(),
        &(
            "unbind".to_string(),
            "s1".to_string(),
            "10.0.0.1".parse::<IpAddr>().unwrap()
        )
    );
}

#[tokio::test]
async fn test_delete_absent_gateway_returns_name() {
    let f = fixture();

    let name = f
        .manager
        .delete_gateway(&f.device, &subnet_info(Some(common_network(Some(2)))))
        .await
        .unwrap();

    assert_eq!(name.as_deref(), Some("gw-s1"));
    assert_eq!(f.appliance.count("network.delete_selfip gw-s1"), 1);
    assert_eq!(f.appliance.count("network.arp_delete"), 0);
    assert_eq!(f.appliance.count("virtual.delete"), 0);
}

#[tokio::test]
async fn test_delete_gateway_without_network() {
    let f = fixture();
    f.manager.state().mark_gateway_assured("dev1", "s1").await;

    let name = f
        .manager
        .delete_gateway(&f.device, &subnet_info(None))
        .await
        .unwrap();

    assert!(name.is_none());
    assert_eq!(f.appliance.total_calls(), 0);
    assert!(f.manager.state().is_gateway_assured("dev1", "s1").await);
}

#[tokio::test]
async fn test_failed_teardown_keeps_gateway_assured() {
    let f = fixture();
    let info = subnet_info(Some(common_network(Some(2))));
    f.manager
        .assure_gateway(&f.device, &info, "tg1")
        .await
        .unwrap();
    *f.appliance.fail_delete_selfip.lock().unwrap() = true;

    let err = f.manager.delete_gateway(&f.device, &info).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(f.manager.state().is_gateway_assured("dev1", "s1").await);
    assert!(f.appliance.self_ip("gw-s1", "Common").is_some());
    assert_eq!(f.appliance.count("virtual.delete"), 0);

    *f.appliance.fail_delete_selfip.lock().unwrap() = false;
    f.manager.delete_gateway(&f.device, &info).await.unwrap();
    assert!(!f.manager.state().is_gateway_assured("dev1", "s1").await);
}
