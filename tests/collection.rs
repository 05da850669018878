mod common;

use std::{cell::RefCell, rc::Rc};

use common::*;
use resinfo::*;

fn abx_resources() -> Vec<(ResourceIdPair, Vec<u8>)> {
    vec![
        (ResourceIdPair::new("A", 1, 0x0409), vec![1]),
        (ResourceIdPair::new("A", 2, 0x0409), vec![2]),
        (ResourceIdPair::new("B", "X", 0x0409), vec![3]),
    ]
}

fn manifest_id() -> ResourceIdPair { ResourceIdPair::new(RT_MANIFEST, 1, 0x0409) }

#[test]
fn load_all_visits_every_resource() {
    init_logger();

    let provider = ListProvider::new(abx_resources());
    let collection = ResourceCollection::open(&provider, &LoadSettings::new()).unwrap();
    assert!(!collection.is_open(), "provider is released after loading");
    assert_eq!(
        collection.keys().cloned().collect::<Vec<_>>(),
        abx_resources().into_iter().map(|(id, _)| id).collect::<Vec<_>>()
    );
    assert_eq!(provider.loads.get(), 3);
    assert_eq!(
        collection.get(&ResourceIdPair::new("B", "X", 0x0409)).unwrap().data(),
        Some(&[3u8][..])
    );

    let directory = directory_with(&[
        (ResourceIdPair::new("A", 1, 0x0409), &[1]),
        (ResourceIdPair::new("A", 2, 0x0409), &[2]),
        (ResourceIdPair::new("B", "X", 0x0409), &[3]),
    ]);
    let collection = ResourceCollection::open(&directory, &LoadSettings::new()).unwrap();
    assert_eq!(collection.len(), 3);
    for (id, data) in abx_resources() {
        assert_eq!(collection.get(&id).unwrap().data(), Some(&data[..]));
    }
}

#[test]
fn duplicate_add_leaves_collection_unchanged() {
    init_logger();

    let mut collection = ResourceCollection::new();
    collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![1])).unwrap();
    collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, 2, 0), vec![2])).unwrap();

    let error = collection
        .add(Resource::generic(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![9]))
        .unwrap_err();
    assert!(matches!(&error, ResourceError::DuplicateKey(id) if *id == ResourceIdPair::new(RT_RCDATA, 1, 0)));
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.get(&ResourceIdPair::new(RT_RCDATA, 1, 0)).unwrap().data(), Some(&[1u8][..]));

    let replaced = collection.replace(Resource::generic(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![9]));
    assert_eq!(replaced.unwrap().data(), Some(&[1u8][..]));
    assert_eq!(
        collection.keys().map(|id| id.name.clone()).collect::<Vec<_>>(),
        vec![ResourceId::from(1), ResourceId::from(2)],
        "replacing keeps the position"
    );
}

#[test]
fn remove_keeps_order() {
    init_logger();

    let mut collection = ResourceCollection::new();
    for name in 1..=4u16 {
        collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, name, 0), vec![name as u8])).unwrap();
    }
    let removed = collection.remove(&ResourceIdPair::new(RT_RCDATA, 2, 0)).unwrap();
    assert_eq!(removed.data(), Some(&[2u8][..]));
    assert!(collection.remove(&ResourceIdPair::new(RT_RCDATA, 2, 0)).is_none());
    assert_eq!(
        collection.iter().map(|resource| resource.name().clone()).collect::<Vec<_>>(),
        vec![ResourceId::from(1), ResourceId::from(3), ResourceId::from(4)]
    );
}

#[test]
fn resources_of_type_and_resource_types() {
    init_logger();

    let mut collection = ResourceCollection::new();
    collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![])).unwrap();
    collection.add(Resource::generic(ResourceIdPair::new(RT_MANIFEST, 1, 0), vec![])).unwrap();
    collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, 2, 0), vec![])).unwrap();
    collection.add(Resource::generic(ResourceIdPair::new("CUSTOM", 1, 0), vec![])).unwrap();

    let rcdata = ResourceId::from(RT_RCDATA);
    let names = || {
        collection
            .resources_of_type(&rcdata)
            .map(|resource| resource.name().clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(), vec![ResourceId::from(1), ResourceId::from(2)]);
    assert_eq!(names(), names(), "query can be repeated");
    assert_eq!(collection.resources_of_type(&ResourceId::from(RT_DIALOG)).count(), 0);

    assert_eq!(
        collection.resource_types(),
        vec![&ResourceId::from(RT_RCDATA), &ResourceId::from(RT_MANIFEST), &ResourceId::from("CUSTOM")]
    );
    assert_eq!((&collection).into_iter().count(), 4);
}

#[test]
fn lazy_collection_lifecycle() {
    init_logger();

    let provider = ListProvider::new(abx_resources());
    let mut collection = ResourceCollection::open(&provider, &LoadSettings::new().lazy()).unwrap();
    assert!(collection.is_open());
    assert!(collection.is_empty(), "nothing is loaded before requested");

    collection.load("A", 2, 0x0409).unwrap();
    assert_eq!(collection.len(), 1);
    assert!(matches!(
        collection.load("A", 2, 0x0409),
        Err(ResourceError::DuplicateKey(_))
    ));
    assert!(matches!(
        collection.load("A", 3, 0x0409),
        Err(ResourceError::NotFound(id)) if id == ResourceIdPair::new("A", 3, 0x0409)
    ));

    collection.close();
    collection.close();
    assert!(!collection.is_open());
    assert!(matches!(collection.load("A", 1, 0x0409), Err(ResourceError::ProviderClosed)));
    assert!(matches!(collection.load_all(), Err(ResourceError::ProviderClosed)));
    assert_eq!(collection.len(), 1, "loaded resources stay available");
    assert_eq!(provider.loads.get(), 2);

    let mut detached = ResourceCollection::new();
    assert!(matches!(detached.load("A", 1, 0x0409), Err(ResourceError::ProviderClosed)));
}

#[test]
fn lazy_load_all_after_partial_load() {
    init_logger();

    let provider = ListProvider::new(abx_resources());
    let mut collection = ResourceCollection::open(&provider, &LoadSettings::new().lazy()).unwrap();
    collection.load_generic("B", "X", 0x0409).unwrap();

    let error = collection.load_all().unwrap_err();
    assert!(matches!(error, ResourceError::DuplicateKey(id) if id == ResourceIdPair::new("B", "X", 0x0409)));
    assert_eq!(collection.len(), 3, "resources enumerated before the duplicate are kept");
}

#[test]
fn provider_failure_keeps_loaded_resources() {
    init_logger();

    let mut resources = abx_resources();
    resources.push((ResourceIdPair::new("C", 1, 0), vec![4]));
    let provider = ListProvider {
        fail_names_of: Some("B".into()),
        ..ListProvider::new(resources)
    };

    let mut collection = ResourceCollection::open(&provider, &LoadSettings::new().lazy()).unwrap();
    let error = collection.load_all().unwrap_err();
    let ResourceError::ProviderFailure { context, source } = &error else {
        panic!("unexpected error: {}", error);
    };
    assert!(context.contains("names of B"), "context names the failing call: {}", context);
    assert_eq!(source.to_string(), "names unavailable");

    assert_eq!(collection.len(), 2, "resources of A are kept");
    assert!(collection.contains(&ResourceIdPair::new("A", 1, 0x0409)));
    assert!(!collection.contains(&ResourceIdPair::new("C", 1, 0)), "enumeration stops at the failure");
    assert!(collection.is_open());

    assert!(
        ResourceCollection::open(&provider, &LoadSettings::new()).is_err(),
        "eager open fails"
    );
}

#[test]
fn decode_failure_stops_enumeration() {
    init_logger();

    let resources = vec![
        (manifest_id(), b"<assembly/>".to_vec()),
        (ResourceIdPair::new(RT_DIALOG, 100, 0x0409), vec![1, 2, 3]),
        (ResourceIdPair::new(RT_RCDATA, 1, 0), vec![4]),
    ];
    let provider = ListProvider::new(resources);

    let mut collection =
        ResourceCollection::open(&provider, &LoadSettings::known_types().lazy()).unwrap();
    let error = collection.load_all().unwrap_err();
    assert!(matches!(error.innermost(), ResourceError::MalformedResource(_)));
    assert_eq!(error.resource_id(), Some(&ResourceIdPair::new(RT_DIALOG, 100, 0x0409)));
    assert_eq!(collection.len(), 1);
    assert!(collection.get(&manifest_id()).unwrap().is_specialized());

    // generic loading bypasses the codec
    let dialog = collection.load_generic(RT_DIALOG, 100, 0x0409).unwrap();
    assert!(!dialog.is_specialized());
    assert_eq!(dialog.data(), Some(&[1u8, 2, 3][..]));
}

#[test]
fn insensitive_names() {
    init_logger();

    let provider = ListProvider::new(vec![(ResourceIdPair::new("Config", "Main", 0), vec![1])]);
    let settings = LoadSettings::new().lazy().with_name_case(NameCase::Insensitive);
    let mut collection = ResourceCollection::open(&provider, &settings).unwrap();

    let resource = collection.load("Config", "Main", 0).unwrap();
    assert_eq!(*resource.id(), ResourceIdPair::new("CONFIG", "MAIN", 0), "keys are upper-cased");
    assert!(collection.contains(&ResourceIdPair::new("config", "main", 0)));
    assert_eq!(collection.resources_of_type(&"config".into()).count(), 1);
    assert!(matches!(
        collection.add(Resource::generic(ResourceIdPair::new("CONFIG", "main", 0), vec![])),
        Err(ResourceError::DuplicateKey(_))
    ));

    let mut sensitive = ResourceCollection::new();
    sensitive.add(Resource::generic(ResourceIdPair::new("Config", "Main", 0), vec![])).unwrap();
    sensitive.add(Resource::generic(ResourceIdPair::new("CONFIG", "MAIN", 0), vec![])).unwrap();
    assert_eq!(sensitive.len(), 2);
}

#[test]
fn registry_snapshot() {
    init_logger();

    let mut settings = LoadSettings::new();
    let collection = ResourceCollection::with_settings(&settings);
    settings.registry.register_format::<Manifest>(RT_MANIFEST).unwrap();
    assert!(!collection.registry().contains(&RT_MANIFEST.into()), "collection keeps its own registry");

    let mut collection = ResourceCollection::with_settings(&settings);
    let resource = collection.add_data(manifest_id(), b"<assembly/>".to_vec()).unwrap();
    assert_eq!(resource.model::<Manifest>(), Some(&Manifest::new("<assembly/>")));
    assert!(matches!(
        collection.add_data(manifest_id(), vec![]),
        Err(ResourceError::DuplicateKey(_))
    ));
}

#[test]
fn save_and_reopen() {
    init_logger();

    let mut collection = ResourceCollection::with_settings(&LoadSettings::known_types());
    let mut strings = StringTable::new();
    strings.set(1, "Hello").unwrap();
    collection.add(Resource::new(manifest_id(), Manifest::new("<assembly/>"))).unwrap();
    collection.add(Resource::new(ResourceIdPair::new(RT_STRING, 1, 0x0409), strings.clone())).unwrap();
    collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, "DATA", 0), vec![1, 2, 3])).unwrap();

    let mut directory = directory_with(&[(ResourceIdPair::new(RT_RCDATA, "OLD", 0), &[0])]);
    collection.save(&mut directory).unwrap();
    assert_eq!(directory.resource_ids().len(), 3, "existing resources are replaced");

    let reopened = ResourceCollection::open(&directory, &LoadSettings::known_types()).unwrap();
    assert_eq!(reopened.len(), 3);
    assert_eq!(
        reopened.get(&manifest_id()).unwrap().model::<Manifest>(),
        Some(&Manifest::new("<assembly/>"))
    );
    assert_eq!(
        reopened.get(&ResourceIdPair::new(RT_STRING, 1, 0x0409)).unwrap().model::<StringTable>(),
        Some(&strings)
    );
    assert_eq!(
        reopened.get(&ResourceIdPair::new(RT_RCDATA, "DATA", 0)).unwrap().data(),
        Some(&[1u8, 2, 3][..])
    );
}

#[test]
fn save_keeping_existing_resources() {
    init_logger();

    let mut collection = ResourceCollection::new();
    collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, "NEW", 0), vec![1])).unwrap();

    let mut directory = directory_with(&[(ResourceIdPair::new(RT_RCDATA, "OLD", 0), &[0])]);
    collection.save_with(&mut directory, UpdateOptions::new()).unwrap();
    assert_eq!(directory.resource_ids().len(), 2);
}

#[test]
fn failed_commit_leaves_target_unchanged() {
    init_logger();

    let log = Rc::new(RefCell::new(TargetLog::default()));
    let original = directory_with(&[(ResourceIdPair::new(RT_RCDATA, 1, 0), &[0])]);
    let mut target = RecordingTarget {
        directory: original.clone(),
        fail_commit: true,
        log: log.clone(),
        ..Default::default()
    };

    let mut transaction = UpdateTransaction::new();
    transaction
        .put_raw(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![1])
        .put_raw(ResourceIdPair::new(RT_RCDATA, 2, 0), vec![2]);
    assert_eq!(transaction.len(), 2);

    let error = transaction.commit(&mut target).unwrap_err();
    assert!(matches!(error, ResourceError::ProviderFailure { .. }));
    assert_eq!(log.borrow().staged.len(), 2);
    assert!(!log.borrow().committed);
    assert_eq!(target.directory, original, "target is unchanged");
}

#[test]
fn failed_update_discards_session() {
    init_logger();

    let log = Rc::new(RefCell::new(TargetLog::default()));
    let mut target = RecordingTarget {
        fail_update: Some(1),
        log: log.clone(),
        ..Default::default()
    };

    let mut transaction = UpdateTransaction::new();
    transaction
        .put_raw(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![1])
        .put_raw(ResourceIdPair::new(RT_RCDATA, 2, 0), vec![2])
        .delete(ResourceIdPair::new(RT_RCDATA, 3, 0));
    let error = transaction.commit(&mut target).unwrap_err();

    let ResourceError::ProviderFailure { context, .. } = &error else {
        panic!("unexpected error: {}", error);
    };
    assert!(context.contains("RCDATA : 2"), "context names the rejected resource: {}", context);
    assert!(log.borrow().discarded, "session is ended without commit");
    assert!(target.directory.is_empty());
}

#[test]
fn encoding_failure_precedes_session() {
    init_logger();

    let log = Rc::new(RefCell::new(TargetLog::default()));
    let mut target = RecordingTarget {
        log: log.clone(),
        ..Default::default()
    };

    let invalid = DialogTemplate {
        style: DS_SETFONT,
        ..Default::default()
    };
    let mut collection = ResourceCollection::new();
    collection.add(Resource::generic(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![1])).unwrap();
    collection.add(Resource::new(ResourceIdPair::new(RT_DIALOG, 1, 0), invalid)).unwrap();

    let error = collection.save(&mut target).unwrap_err();
    assert!(matches!(error.innermost(), ResourceError::EncodingInvariantViolation(_)));
    assert_eq!(log.borrow().sessions, 0, "no session is opened");

    let mut transaction = UpdateTransaction::new();
    assert!(transaction.put(collection.get(&ResourceIdPair::new(RT_DIALOG, 1, 0)).unwrap()).is_err());
    assert!(transaction.is_empty());
}

#[test]
fn transaction_keeps_last_update_per_resource() {
    init_logger();

    let mut target = RecordingTarget::default();
    let id = ResourceIdPair::new(RT_RCDATA, 1, 0);
    let mut transaction = UpdateTransaction::new();
    transaction.put_raw(id.clone(), vec![1]).delete(id.clone()).put_raw(id.clone(), vec![2]);
    assert_eq!(transaction.len(), 1);
    assert!(transaction.contains(&id));

    transaction.commit(&mut target).unwrap();
    assert_eq!(target.directory.get(&id).unwrap().data(), &[2]);
    assert!(target.log.borrow().committed);
}

#[test]
fn save_keeps_codepages() {
    init_logger();

    let mut directory = ResourceDirectory::default();
    directory.insert(&manifest_id(), ResourceData::new(b"<assembly/>".to_vec(), 1252));
    directory.insert(&ResourceIdPair::new(RT_RCDATA, 1, 0), ResourceData::new(vec![1, 2], 0));

    let mut collection = ResourceCollection::load_from(&directory, &LoadSettings::known_types()).unwrap();
    assert_eq!(collection.get(&manifest_id()).unwrap().codepage(), 1252);
    let mut added = Resource::generic(ResourceIdPair::new(RT_RCDATA, 2, 0), vec![3]);
    added.set_codepage(65001);
    collection.add(added).unwrap();

    let mut target = ResourceDirectory::default();
    collection.save(&mut target).unwrap();
    assert_eq!(target.get(&manifest_id()).unwrap().codepage(), 1252, "loaded codepage is saved");
    assert_eq!(target.get(&ResourceIdPair::new(RT_RCDATA, 1, 0)).unwrap().codepage(), 0);
    assert_eq!(target.get(&ResourceIdPair::new(RT_RCDATA, 2, 0)).unwrap().codepage(), 65001);

    let data = build_image(None, true);
    let mut image = Image::parse(&data[..]).unwrap();
    collection.save(&mut image).unwrap();
    let reparsed = Image::parse(image.data()).unwrap();
    let resources = ResourceCollection::load_from(&reparsed, &LoadSettings::new()).unwrap();
    assert_eq!(resources.get(&manifest_id()).unwrap().codepage(), 1252, "codepage survives the image");
    assert_eq!(resources.get(&ResourceIdPair::new(RT_RCDATA, 2, 0)).unwrap().codepage(), 65001);
}
